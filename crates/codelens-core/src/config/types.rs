use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use codelens_index::files::ScanConfig;
use codelens_index::indexer::IndexerConfig;
use codelens_index::languages::{Lang, LanguageRegistry};
use codelens_index::retriever::RetrievalConfig;
use serde::{Deserialize, Serialize};

/// External model backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Claude,
    Gemini,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
        }
    }

    /// Environment variable holding this provider's API key.
    #[must_use]
    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::OpenAi => "CODELENS_OPENAI_API_KEY",
            Self::Claude => "CODELENS_CLAUDE_API_KEY",
            Self::Gemini => "CODELENS_GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wrapper for sensitive strings with redacted Debug/Display.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// API keys. Never read from the config file, only from the environment.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<Secret>,
    pub claude_api_key: Option<Secret>,
    pub gemini_api_key: Option<Secret>,
}

impl ResolvedSecrets {
    #[must_use]
    pub fn for_provider(&self, kind: ProviderKind) -> Option<&Secret> {
        match kind {
            ProviderKind::OpenAi => self.openai_api_key.as_ref(),
            ProviderKind::Claude => self.claude_api_key.as_ref(),
            ProviderKind::Gemini => self.gemini_api_key.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub index: IndexConfig,
    pub scan: ScanConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub timeouts: TimeoutConfig,
    pub languages: LanguageOverrides,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Holds one directory per project.
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".data/codelens"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Qdrant gRPC endpoint. Unset disables the external vector index.
    pub qdrant_url: Option<String>,
    pub collection_prefix: String,
    pub window_lines: usize,
    pub concurrency: usize,
    pub snippet_chars: usize,
    pub exclude_patterns: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        let indexer = IndexerConfig::default();
        let retrieval = RetrievalConfig::default();
        Self {
            qdrant_url: None,
            collection_prefix: codelens_index::vector::DEFAULT_PREFIX.to_owned(),
            window_lines: indexer.window_lines,
            concurrency: indexer.concurrency,
            snippet_chars: retrieval.snippet_chars,
            exclude_patterns: retrieval.exclude_patterns,
        }
    }
}

impl IndexConfig {
    #[must_use]
    pub fn indexer(&self) -> IndexerConfig {
        IndexerConfig {
            window_lines: self.window_lines,
            concurrency: self.concurrency,
        }
    }

    #[must_use]
    pub fn retrieval(&self) -> RetrievalConfig {
        RetrievalConfig {
            snippet_chars: self.snippet_chars,
            exclude_patterns: self.exclude_patterns.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Unset means stub embeddings only.
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Stub dimension; a provider's own dimension takes over once it answers.
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            base_url: None,
            dimension: codelens_index::embedding::DEFAULT_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Unset means placeholder reviews.
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    /// Tried in order after `model` (Gemini only).
    pub fallback_models: Vec<String>,
    pub base_url: Option<String>,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            fallback_models: Vec::new(),
            base_url: None,
            max_tokens: 4096,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub embedding_secs: u64,
    pub llm_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            embedding_secs: 15,
            llm_secs: 120,
        }
    }
}

/// Additions to the built-in language table.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LanguageOverrides {
    /// Extension (with or without the dot) to language; replaces built-ins.
    pub extensions: HashMap<String, Lang>,
    /// Shebang substrings; replaces the built-in list for that language.
    pub shebangs: BTreeMap<Lang, Vec<String>>,
    /// Parse-probe order; unset keeps the built-in order.
    pub fallback: Option<Vec<Lang>>,
}

impl LanguageOverrides {
    #[must_use]
    pub fn registry(&self) -> LanguageRegistry {
        let mut registry = LanguageRegistry::default();
        for (ext, lang) in &self.extensions {
            let ext = ext.to_ascii_lowercase();
            let key = if ext.starts_with('.') { ext } else { format!(".{ext}") };
            registry.extensions.insert(key, *lang);
        }
        for (lang, tokens) in &self.shebangs {
            registry.shebangs.insert(*lang, tokens.clone());
        }
        if let Some(fallback) = &self.fallback {
            registry.fallback.clone_from(fallback);
        }
        registry
    }
}

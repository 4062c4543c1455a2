use super::{Config, ProviderKind, Secret};

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_core();
        self.apply_env_overrides_providers();
    }

    fn apply_env_overrides_core(&mut self) {
        if let Ok(v) = std::env::var("CODELENS_STORAGE_DIR") {
            self.storage.dir = v.into();
        }
        if let Ok(v) = std::env::var("CODELENS_QDRANT_URL") {
            self.index.qdrant_url = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = std::env::var("CODELENS_COLLECTION_PREFIX") {
            self.index.collection_prefix = v;
        }
        if let Ok(v) = std::env::var("CODELENS_INDEX_WINDOW_LINES") {
            match v.parse::<usize>() {
                Ok(n) => self.index.window_lines = n,
                Err(_) => tracing::warn!("ignoring invalid CODELENS_INDEX_WINDOW_LINES value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("CODELENS_INDEX_CONCURRENCY") {
            match v.parse::<usize>() {
                Ok(n) => self.index.concurrency = n,
                Err(_) => tracing::warn!("ignoring invalid CODELENS_INDEX_CONCURRENCY value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("CODELENS_SNIPPET_CHARS")
            && let Ok(n) = v.parse::<usize>()
        {
            self.index.snippet_chars = n;
        }
        if let Ok(v) = std::env::var("CODELENS_EXCLUDE_PATTERNS") {
            self.index.exclude_patterns = split_list(&v);
        }
        if let Ok(v) = std::env::var("CODELENS_MAX_FILE_BYTES")
            && let Ok(n) = v.parse::<u64>()
        {
            self.scan.max_file_bytes = n;
        }
        if let Ok(v) = std::env::var("CODELENS_TIMEOUT_EMBEDDING")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.embedding_secs = secs;
        }
        if let Ok(v) = std::env::var("CODELENS_TIMEOUT_LLM")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.llm_secs = secs;
        }
    }

    fn apply_env_overrides_providers(&mut self) {
        if let Ok(v) = std::env::var("CODELENS_EMBEDDING_PROVIDER") {
            match parse_provider(&v) {
                Some(kind) => self.embedding.provider = kind,
                None => tracing::warn!("ignoring invalid CODELENS_EMBEDDING_PROVIDER value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("CODELENS_EMBEDDING_MODEL") {
            self.embedding.model = Some(v);
        }
        if let Ok(v) = std::env::var("CODELENS_EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("CODELENS_EMBEDDING_DIMENSION") {
            match v.parse::<usize>() {
                Ok(n) => self.embedding.dimension = n,
                Err(_) => tracing::warn!("ignoring invalid CODELENS_EMBEDDING_DIMENSION value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("CODELENS_LLM_PROVIDER") {
            match parse_provider(&v) {
                Some(kind) => self.llm.provider = kind,
                None => tracing::warn!("ignoring invalid CODELENS_LLM_PROVIDER value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("CODELENS_LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Ok(v) = std::env::var("CODELENS_LLM_FALLBACK_MODELS") {
            self.llm.fallback_models = split_list(&v);
        }
        if let Ok(v) = std::env::var("CODELENS_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("CODELENS_LLM_MAX_TOKENS")
            && let Ok(n) = v.parse::<u32>()
        {
            self.llm.max_tokens = n;
        }

        for kind in [ProviderKind::OpenAi, ProviderKind::Claude, ProviderKind::Gemini] {
            let Ok(v) = std::env::var(kind.api_key_env()) else {
                continue;
            };
            if v.is_empty() {
                continue;
            }
            let slot = match kind {
                ProviderKind::OpenAi => &mut self.secrets.openai_api_key,
                ProviderKind::Claude => &mut self.secrets.claude_api_key,
                ProviderKind::Gemini => &mut self.secrets.gemini_api_key,
            };
            *slot = Some(Secret::new(v));
        }
    }
}

/// `none` or an empty value clears the provider.
fn parse_provider(v: &str) -> Option<Option<ProviderKind>> {
    if v.is_empty() || v.eq_ignore_ascii_case("none") {
        return Some(None);
    }
    serde_json::from_value(serde_json::Value::String(v.to_ascii_lowercase()))
        .ok()
        .map(Some)
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

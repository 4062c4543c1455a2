//! Turn a validated [`Config`] into components and capabilities, once.

use std::sync::Arc;
use std::time::Duration;

use codelens_index::Capability;
use codelens_index::embedding::Embedder;
use codelens_index::fallback::LocalIndex;
use codelens_index::indexer::ProjectIndexer;
use codelens_index::languages::LanguageRegistry;
use codelens_index::qdrant_ops::QdrantOps;
use codelens_index::retriever::Retriever;
use codelens_index::storage::ProjectStorage;
use codelens_index::vector::VectorIndex;
use codelens_llm::any::AnyProvider;
use codelens_llm::claude::{self, ClaudeProvider};
use codelens_llm::gemini::{self, GeminiProvider};
use codelens_llm::openai::{self, OpenAiProvider};

use crate::config::{Config, ProviderKind};
use crate::review::Reviewer;

/// Everything a command needs, built from config at startup.
#[derive(Debug, Clone)]
pub struct Components {
    pub config: Config,
    pub storage: ProjectStorage,
    pub registry: Arc<LanguageRegistry>,
    pub embedder: Arc<Embedder>,
    pub vector: Capability<VectorIndex>,
    pub generator: Capability<AnyProvider>,
}

impl Components {
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        let embedder = Embedder::new(
            embedding_provider(&config),
            config.embedding.dimension,
            Duration::from_secs(config.timeouts.embedding_secs),
        );
        Self {
            storage: ProjectStorage::new(&config.storage.dir),
            registry: Arc::new(config.languages.registry()),
            embedder: Arc::new(embedder),
            vector: vector_index(&config),
            generator: generation_provider(&config),
            config,
        }
    }

    #[must_use]
    pub fn indexer(&self) -> ProjectIndexer {
        ProjectIndexer::new(
            self.storage.clone(),
            Arc::clone(&self.embedder),
            self.vector.clone(),
            Arc::clone(&self.registry),
            self.config.index.indexer(),
        )
    }

    #[must_use]
    pub fn retriever(&self) -> Retriever {
        Retriever::new(
            Arc::clone(&self.embedder),
            self.vector.clone(),
            LocalIndex::new(self.storage.clone()),
            &self.config.index.retrieval(),
        )
    }

    #[must_use]
    pub fn reviewer(&self) -> Reviewer {
        Reviewer::new(
            self.retriever(),
            self.generator.clone(),
            Duration::from_secs(self.config.timeouts.llm_secs),
        )
    }
}

/// Qdrant-backed index when a URL is configured.
#[must_use]
pub fn vector_index(config: &Config) -> Capability<VectorIndex> {
    let Some(url) = config.index.qdrant_url.as_deref() else {
        tracing::debug!("no qdrant_url configured, vector index unavailable");
        return Capability::Unavailable;
    };
    match QdrantOps::new(url) {
        Ok(ops) => {
            tracing::info!(url, "vector index configured");
            Capability::Available(VectorIndex::new(
                Arc::new(ops),
                config.index.collection_prefix.clone(),
            ))
        }
        Err(e) => {
            tracing::warn!(url, "failed to create qdrant client, vector index unavailable: {e}");
            Capability::Unavailable
        }
    }
}

/// Embedding backend; needs a provider, its key and a model.
#[must_use]
pub fn embedding_provider(config: &Config) -> Capability<AnyProvider> {
    let Some(kind) = config.embedding.provider else {
        tracing::debug!("no embedding provider configured, using stub embeddings");
        return Capability::Unavailable;
    };
    let Some(key) = config.secrets.for_provider(kind) else {
        tracing::debug!(provider = %kind, "{} not set, using stub embeddings", kind.api_key_env());
        return Capability::Unavailable;
    };
    let Some(model) = config.embedding.model.clone() else {
        tracing::debug!(provider = %kind, "no embedding model configured, using stub embeddings");
        return Capability::Unavailable;
    };
    let key = key.expose().to_owned();
    let base_url = config.embedding.base_url.clone();
    let provider = match kind {
        ProviderKind::OpenAi => AnyProvider::OpenAi(OpenAiProvider::new(
            key,
            base_url.unwrap_or_else(|| openai::DEFAULT_BASE_URL.to_owned()),
            None,
            config.llm.max_tokens,
            Some(model),
        )),
        ProviderKind::Gemini => AnyProvider::Gemini(GeminiProvider::new(
            key,
            base_url.unwrap_or_else(|| gemini::DEFAULT_BASE_URL.to_owned()),
            Vec::new(),
            Some(model),
        )),
        ProviderKind::Claude => {
            tracing::warn!(provider = %kind, "provider has no embedding endpoint, using stub embeddings");
            return Capability::Unavailable;
        }
    };
    tracing::info!(provider = %kind, "embedding provider configured");
    Capability::Available(provider)
}

/// Generation backend; needs a provider, its key and at least one model.
#[must_use]
pub fn generation_provider(config: &Config) -> Capability<AnyProvider> {
    let Some(kind) = config.llm.provider else {
        tracing::debug!("no llm provider configured, reviews will be placeholders");
        return Capability::Unavailable;
    };
    let Some(key) = config.secrets.for_provider(kind) else {
        tracing::debug!(provider = %kind, "{} not set, reviews will be placeholders", kind.api_key_env());
        return Capability::Unavailable;
    };
    let Some(model) = config.llm.model.clone() else {
        tracing::debug!(provider = %kind, "no llm model configured, reviews will be placeholders");
        return Capability::Unavailable;
    };
    let key = key.expose().to_owned();
    let base_url = config.llm.base_url.clone();
    let provider = match kind {
        ProviderKind::OpenAi => AnyProvider::OpenAi(OpenAiProvider::new(
            key,
            base_url.unwrap_or_else(|| openai::DEFAULT_BASE_URL.to_owned()),
            Some(model),
            config.llm.max_tokens,
            None,
        )),
        ProviderKind::Claude => AnyProvider::Claude(ClaudeProvider::new(
            key,
            base_url.unwrap_or_else(|| claude::DEFAULT_BASE_URL.to_owned()),
            model,
            config.llm.max_tokens,
        )),
        ProviderKind::Gemini => {
            let mut models = vec![model];
            models.extend(config.llm.fallback_models.iter().cloned());
            AnyProvider::Gemini(GeminiProvider::new(
                key,
                base_url.unwrap_or_else(|| gemini::DEFAULT_BASE_URL.to_owned()),
                models,
                None,
            ))
        }
    };
    tracing::info!(provider = %kind, "llm provider configured");
    Capability::Available(provider)
}

//! Text embedding with a provider tier and a deterministic local stub.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use codelens_llm::LlmProvider;
use codelens_llm::any::AnyProvider;

use crate::capability::Capability;

/// Stub dimension when nothing else is known.
pub const DEFAULT_DIMENSION: usize = 64;

/// Embeds text, preferring the configured provider.
///
/// Provider absence and provider failure both end in [`stub_embedding`]. The
/// stub adopts the dimension of the last successful provider vector so one
/// failed call does not produce a vector the project namespace would reject.
#[derive(Debug)]
pub struct Embedder {
    provider: Capability<AnyProvider>,
    dimension: AtomicUsize,
    timeout: Duration,
}

impl Embedder {
    #[must_use]
    pub fn new(provider: Capability<AnyProvider>, dimension: usize, timeout: Duration) -> Self {
        Self {
            provider,
            dimension: AtomicUsize::new(dimension.max(1)),
            timeout,
        }
    }

    /// Stub-only embedder.
    #[must_use]
    pub fn stub(dimension: usize) -> Self {
        Self::new(Capability::Unavailable, dimension, Duration::from_secs(1))
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn provider_name(&self) -> Option<&'static str> {
        self.provider.as_available().map(LlmProvider::name)
    }

    /// Embed `text`. Never fails.
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        let Some(provider) = self.provider.as_available() else {
            tracing::debug!("no embedding provider configured, using stub");
            return stub_embedding(text, self.dimension());
        };
        if !provider.supports_embeddings() {
            tracing::debug!(provider = provider.name(), "provider has no embedding model, using stub");
            return stub_embedding(text, self.dimension());
        }

        match tokio::time::timeout(self.timeout, provider.embed(text)).await {
            Ok(Ok(vector)) if !vector.is_empty() => {
                self.dimension.store(vector.len(), Ordering::Relaxed);
                vector
            }
            Ok(Ok(_)) => {
                tracing::warn!(provider = provider.name(), "empty embedding, using stub");
                stub_embedding(text, self.dimension())
            }
            Ok(Err(e)) => {
                tracing::warn!(provider = provider.name(), "embedding failed, using stub: {e}");
                stub_embedding(text, self.dimension())
            }
            Err(_) => {
                tracing::warn!(
                    provider = provider.name(),
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "embedding timed out, using stub"
                );
                stub_embedding(text, self.dimension())
            }
        }
    }
}

/// Deterministic feature-hashed embedding of identifier tokens.
///
/// Each token is hashed with blake3 into one of `dimension` buckets with a
/// hash-derived sign, then the vector is L2-normalized. Text without tokens
/// maps to the zero vector.
#[must_use]
pub fn stub_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let dimension = dimension.max(1);
    let mut vector = vec![0.0_f32; dimension];
    let dim = u64::try_from(dimension).unwrap_or(u64::MAX);

    for token in text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
    {
        let lowered = token.to_lowercase();
        let hash = blake3::hash(lowered.as_bytes());
        let bytes = hash.as_bytes();
        let mut head = [0u8; 8];
        head.copy_from_slice(&bytes[..8]);
        let bucket = usize::try_from(u64::from_le_bytes(head) % dim).unwrap_or(0);
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }

    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

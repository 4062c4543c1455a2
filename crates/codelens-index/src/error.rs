//! Error types for codelens-index.

use std::num::TryFromIntError;

use crate::vector_store::VectorStoreError;

/// Errors that can occur during indexing and retrieval.
///
/// Input defects (unreadable files, malformed source) never reach this type;
/// they are skipped where they occur. The variants that matter to callers are
/// the contract violations: [`IndexError::DimensionMismatch`],
/// [`IndexError::PathEscape`] and [`IndexError::InvalidProjectId`].
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading source files or project storage.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Vector store backend error.
    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    /// LLM provider error (embedding).
    #[error("LLM error: {0}")]
    Llm(#[from] codelens_llm::LlmError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tree-sitter setup error.
    #[error("parse failed: {0}")]
    Parse(String),

    /// A vector does not match the dimension the namespace was created with.
    #[error("dimension mismatch in {namespace}: expected {expected}, got {actual}")]
    DimensionMismatch {
        namespace: String,
        expected: u64,
        actual: u64,
    },

    /// The project has no vector namespace yet; nothing was ever indexed.
    #[error("vector namespace {0} has no data")]
    NamespaceMissing(String),

    /// A file reference leaves the project root.
    #[error("path escapes project root: {0}")]
    PathEscape(String),

    /// Project ids become directory and namespace names.
    #[error("invalid project id: {0:?}")]
    InvalidProjectId(String),

    /// Integer conversion error.
    #[error("integer conversion failed: {0}")]
    IntConversion(#[from] TryFromIntError),

    /// Background task panicked or was cancelled.
    #[error("task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Generic catch-all error.
    #[error("{0}")]
    Other(String),
}

impl IndexError {
    /// Contract violations must propagate; everything else may degrade.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. } | Self::PathEscape(_) | Self::InvalidProjectId(_)
        )
    }
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_violations_are_classified() {
        let err = IndexError::DimensionMismatch {
            namespace: "codelens-p".into(),
            expected: 64,
            actual: 3,
        };
        assert!(err.is_contract_violation());
        assert!(err.to_string().contains("expected 64, got 3"));
        assert!(IndexError::PathEscape("../x".into()).is_contract_violation());
        assert!(!IndexError::Other("x".into()).is_contract_violation());
    }
}

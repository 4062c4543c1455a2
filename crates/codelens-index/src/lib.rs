//! Code indexing and retrieval for review.
//!
//! Source files are classified, split into AST chunks (or line windows when
//! no grammar applies), embedded, and stored in a per-project vector
//! namespace. Retrieval prefers that namespace, scoped to an anchor file and
//! its import neighbors, and degrades to a whole-file local index when the
//! external store is missing or failing.

pub mod capability;
pub mod chunker;
pub mod deps;
pub mod embedding;
pub mod error;
pub mod fallback;
pub mod files;
pub mod heuristics;
pub mod in_memory_store;
pub mod indexer;
pub mod languages;
pub mod qdrant_ops;
pub mod retriever;
pub mod storage;
pub mod vector;
pub mod vector_store;

pub use capability::Capability;
pub use error::{IndexError, Result};

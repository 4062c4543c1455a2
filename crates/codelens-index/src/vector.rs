//! Per-project vector namespaces over a [`VectorStore`].

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use crate::chunker::Chunk;
use crate::error::{IndexError, Result};
use crate::files::ProjectId;
use crate::languages::lang_tag;
use crate::vector_store::{VectorFilter, VectorPoint, VectorStore};

pub const DEFAULT_PREFIX: &str = "codelens";

/// A chunk paired with its embedding, ready to upsert.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// One scored chunk read back from a namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub path: String,
    pub score: f32,
    pub start_line: usize,
    pub end_line: usize,
    pub language: String,
    pub raw_id: String,
    pub content_hash: String,
    pub code: String,
}

/// Namespaced access to the external vector store.
///
/// Each project lives in `"{prefix}-{project}"`. The namespace dimension is
/// fixed by the first write or query; later vectors of another length are
/// rejected with [`IndexError::DimensionMismatch`].
#[derive(Clone)]
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    prefix: String,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn namespace(&self, project: &ProjectId) -> String {
        format!("{}-{}", self.prefix, project)
    }

    /// Create the namespace with `dim` if absent, otherwise check its dimension.
    /// Returns `true` when the namespace was created by this call.
    ///
    /// # Errors
    ///
    /// [`IndexError::DimensionMismatch`] when the namespace exists with another
    /// dimension, or a store error.
    pub async fn ensure_namespace(&self, project: &ProjectId, dim: usize) -> Result<bool> {
        let namespace = self.namespace(project);
        let actual = u64::try_from(dim)?;
        match self.store.collection_dimension(&namespace).await? {
            Some(expected) if expected == actual => Ok(false),
            Some(expected) => Err(IndexError::DimensionMismatch {
                namespace,
                expected,
                actual,
            }),
            None => {
                self.store.ensure_collection(&namespace, actual).await?;
                tracing::info!(project = %project, namespace, dim, "provisioned vector namespace");
                Ok(true)
            }
        }
    }

    /// Upsert `entries`; re-upserting a chunk with the same range and content
    /// replaces it. Nested chunks sharing a range stay distinct points.
    ///
    /// # Errors
    ///
    /// [`IndexError::DimensionMismatch`] for a mixed-dimension batch or a batch
    /// that disagrees with the namespace, or a store error.
    pub async fn upsert(&self, project: &ProjectId, entries: &[IndexEntry]) -> Result<usize> {
        let Some(first) = entries.first() else {
            return Ok(0);
        };
        let dim = first.vector.len();
        if let Some(odd) = entries.iter().find(|e| e.vector.len() != dim) {
            return Err(IndexError::DimensionMismatch {
                namespace: self.namespace(project),
                expected: u64::try_from(dim)?,
                actual: u64::try_from(odd.vector.len())?,
            });
        }
        self.ensure_namespace(project, dim).await?;

        let points: Vec<VectorPoint> = entries
            .iter()
            .map(|e| VectorPoint {
                id: point_id(project, &e.chunk),
                vector: e.vector.clone(),
                payload: payload(project, &e.chunk),
            })
            .collect();
        let count = points.len();
        self.store.upsert(&self.namespace(project), points).await?;
        tracing::debug!(project = %project, count, "upserted chunks");
        Ok(count)
    }

    /// Top `limit` chunks for `vector`, optionally restricted to one path.
    ///
    /// A namespace that does not exist yet is provisioned with the query
    /// dimension and reported as [`IndexError::NamespaceMissing`].
    ///
    /// # Errors
    ///
    /// [`IndexError::DimensionMismatch`], [`IndexError::NamespaceMissing`], or a
    /// store error.
    pub async fn search(
        &self,
        project: &ProjectId,
        vector: &[f32],
        limit: usize,
        path: Option<&str>,
    ) -> Result<Vec<VectorHit>> {
        if self.ensure_namespace(project, vector.len()).await? {
            return Err(IndexError::NamespaceMissing(self.namespace(project)));
        }
        let mut filter = VectorFilter::default().must_text("project_id", project.as_str());
        if let Some(path) = path {
            filter = filter.must_text("path", path);
        }
        let points = self
            .store
            .search(
                &self.namespace(project),
                vector.to_vec(),
                u64::try_from(limit)?,
                Some(filter),
            )
            .await?;
        Ok(points
            .into_iter()
            .filter_map(|p| hit_from_payload(p.score, &p.payload))
            .collect())
    }

    /// Drop every chunk of `path`. A missing namespace is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn remove_path(&self, project: &ProjectId, path: &str) -> Result<()> {
        let namespace = self.namespace(project);
        if !self.store.collection_exists(&namespace).await? {
            return Ok(());
        }
        let filter = VectorFilter::default()
            .must_text("project_id", project.as_str())
            .must_text("path", path);
        self.store.delete_by_filter(&namespace, filter).await?;
        Ok(())
    }

    /// Drop every chunk of `project`, keeping the namespace and its dimension.
    /// A missing namespace is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn clear_project(&self, project: &ProjectId) -> Result<()> {
        let namespace = self.namespace(project);
        if !self.store.collection_exists(&namespace).await? {
            return Ok(());
        }
        let filter = VectorFilter::default().must_text("project_id", project.as_str());
        self.store.delete_by_filter(&namespace, filter).await?;
        tracing::debug!(project = %project, namespace, "cleared project chunks");
        Ok(())
    }

    /// Delete and recreate the namespace with a new dimension.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn reprovision(&self, project: &ProjectId, dim: usize) -> Result<()> {
        let namespace = self.namespace(project);
        if self.store.collection_exists(&namespace).await? {
            self.store.delete_collection(&namespace).await?;
        }
        self.store
            .ensure_collection(&namespace, u64::try_from(dim)?)
            .await?;
        tracing::info!(project = %project, namespace, dim, "reprovisioned vector namespace");
        Ok(())
    }
}

fn point_id(project: &ProjectId, chunk: &Chunk) -> String {
    let key = format!("{project}:{}:{}", chunk.raw_id(), chunk.content_hash);
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

fn payload(project: &ProjectId, chunk: &Chunk) -> HashMap<String, serde_json::Value> {
    HashMap::from([
        ("project_id".to_owned(), json!(project.as_str())),
        ("path".to_owned(), json!(chunk.path)),
        ("start_line".to_owned(), json!(chunk.start_line)),
        ("end_line".to_owned(), json!(chunk.end_line)),
        ("language".to_owned(), json!(lang_tag(chunk.language))),
        ("raw_id".to_owned(), json!(chunk.raw_id())),
        ("content_hash".to_owned(), json!(chunk.content_hash)),
        ("code".to_owned(), json!(chunk.text)),
    ])
}

fn hit_from_payload(score: f32, payload: &HashMap<String, serde_json::Value>) -> Option<VectorHit> {
    let text = |key: &str| payload.get(key).and_then(|v| v.as_str()).map(str::to_owned);
    let line = |key: &str| {
        payload
            .get(key)
            .and_then(serde_json::Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
    };
    Some(VectorHit {
        path: text("path")?,
        score,
        start_line: line("start_line").unwrap_or(1),
        end_line: line("end_line").unwrap_or(1),
        language: text("language").unwrap_or_else(|| "unknown".to_owned()),
        raw_id: text("raw_id").unwrap_or_default(),
        content_hash: text("content_hash").unwrap_or_default(),
        code: text("code").unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk_by_lines;
    use crate::in_memory_store::InMemoryVectorStore;

    fn index() -> (Arc<InMemoryVectorStore>, VectorIndex) {
        let store = Arc::new(InMemoryVectorStore::new());
        let index = VectorIndex::new(store.clone(), DEFAULT_PREFIX);
        (store, index)
    }

    fn entry(path: &str, text: &str, vector: Vec<f32>) -> IndexEntry {
        let chunk = chunk_by_lines(text, 80, 1, path, None).remove(0);
        IndexEntry { chunk, vector }
    }

    fn project() -> ProjectId {
        ProjectId::new("p1").unwrap()
    }

    #[tokio::test]
    async fn first_upsert_provisions_with_observed_dimension() {
        let (store, index) = index();
        let n = index
            .upsert(&project(), &[entry("a.py", "x = 1\n", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(
            store.collection_dimension("codelens-p1").await.unwrap(),
            Some(3)
        );
    }

    #[tokio::test]
    async fn dimension_mismatch_is_an_error() {
        let (_store, index) = index();
        index
            .upsert(&project(), &[entry("a.py", "x\n", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        let err = index
            .upsert(&project(), &[entry("b.py", "y\n", vec![1.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch { expected: 3, actual: 2, .. }
        ));
        let err = index.search(&project(), &[1.0], 5, None).await.unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn mixed_batch_is_rejected_before_provisioning() {
        let (store, index) = index();
        let err = index
            .upsert(
                &project(),
                &[entry("a.py", "x\n", vec![1.0, 0.0]), entry("b.py", "y\n", vec![1.0])],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { .. }));
        assert!(!store.collection_exists("codelens-p1").await.unwrap());
    }

    #[tokio::test]
    async fn reupsert_replaces_same_chunk() {
        let (store, index) = index();
        index
            .upsert(&project(), &[entry("a.py", "x\n", vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert(&project(), &[entry("a.py", "x\n", vec![0.0, 1.0])])
            .await
            .unwrap();
        assert_eq!(store.point_count("codelens-p1"), 1);
    }

    #[tokio::test]
    async fn search_on_fresh_project_reports_missing_namespace() {
        let (store, index) = index();
        let err = index.search(&project(), &[1.0, 0.0], 5, None).await.unwrap_err();
        assert!(matches!(err, IndexError::NamespaceMissing(_)));
        assert!(store.collection_exists("codelens-p1").await.unwrap());
        assert!(index.search(&project(), &[1.0, 0.0], 5, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_filters_by_path_and_maps_payload() {
        let (_store, index) = index();
        index
            .upsert(
                &project(),
                &[
                    entry("a.py", "def a():\n    pass\n", vec![1.0, 0.0]),
                    entry("b.py", "def b():\n    pass\n", vec![1.0, 0.1]),
                ],
            )
            .await
            .unwrap();

        let hits = index
            .search(&project(), &[1.0, 0.0], 5, Some("b.py"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.path, "b.py");
        assert_eq!((hit.start_line, hit.end_line), (1, 2));
        assert_eq!(hit.raw_id, "b.py:1-2");
        assert_eq!(hit.language, "unknown");
        assert!(hit.code.starts_with("def b()"));
    }

    #[tokio::test]
    async fn remove_path_and_reprovision() {
        let (store, index) = index();
        index.remove_path(&project(), "a.py").await.unwrap();
        index
            .upsert(
                &project(),
                &[entry("a.py", "x\n", vec![1.0, 0.0]), entry("b.py", "y\n", vec![0.0, 1.0])],
            )
            .await
            .unwrap();
        index.remove_path(&project(), "a.py").await.unwrap();
        assert_eq!(store.point_count("codelens-p1"), 1);

        index.reprovision(&project(), 4).await.unwrap();
        assert_eq!(store.point_count("codelens-p1"), 0);
        assert_eq!(
            store.collection_dimension("codelens-p1").await.unwrap(),
            Some(4)
        );
    }

    #[tokio::test]
    async fn clear_project_keeps_namespace() {
        let (store, index) = index();
        index.clear_project(&project()).await.unwrap();
        index
            .upsert(
                &project(),
                &[entry("a.py", "x\n", vec![1.0, 0.0]), entry("b.py", "y\n", vec![0.0, 1.0])],
            )
            .await
            .unwrap();
        index.clear_project(&project()).await.unwrap();
        assert_eq!(store.point_count("codelens-p1"), 0);
        assert_eq!(
            store.collection_dimension("codelens-p1").await.unwrap(),
            Some(2)
        );
    }

    #[test]
    fn point_ids_are_stable_per_project() {
        let chunk = entry("a.py", "x = 1\ny = 2\n", vec![1.0]).chunk;
        let a = point_id(&project(), &chunk);
        assert_eq!(a, point_id(&project(), &chunk.clone()));
        assert_ne!(a, point_id(&ProjectId::new("p2").unwrap(), &chunk));
    }

    #[cfg(feature = "lang-java")]
    #[tokio::test]
    async fn same_line_class_and_method_are_separate_points() {
        let (store, index) = index();
        let chunks = crate::chunker::chunk_source(
            Some(crate::languages::Lang::Java),
            "class A { void run() {} }\n",
            "A.java",
            80,
        );
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].raw_id(), chunks[1].raw_id());

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .map(|chunk| IndexEntry {
                chunk,
                vector: vec![1.0, 0.0],
            })
            .collect();
        assert_eq!(index.upsert(&project(), &entries).await.unwrap(), 2);
        assert_eq!(store.point_count("codelens-p1"), 2);

        let hits = index.search(&project(), &[1.0, 0.0], 5, Some("A.java")).await.unwrap();
        assert_eq!(hits.len(), 2);
    }
}

//! Whole-file local vector index, always available.

use crate::error::Result;
use crate::files::ProjectId;
use crate::in_memory_store::cosine_similarity;
use crate::storage::{ProjectStorage, VectorMap};

/// One scored file from the local index.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalHit {
    pub path: String,
    pub score: f32,
}

/// Flat `path → vector` index persisted per project.
///
/// Updates are read-then-overwrite with no locking: concurrent writers to the
/// same project can lose each other's updates.
#[derive(Debug, Clone)]
pub struct LocalIndex {
    storage: ProjectStorage,
}

impl LocalIndex {
    #[must_use]
    pub fn new(storage: ProjectStorage) -> Self {
        Self { storage }
    }

    pub async fn load(&self, project: &ProjectId) -> VectorMap {
        self.storage.load_vectors(project).await
    }

    /// # Errors
    ///
    /// Returns an error if the vectors file cannot be written.
    pub async fn store(&self, project: &ProjectId, vectors: &VectorMap) -> Result<()> {
        self.storage.store_vectors(project, vectors).await
    }

    /// Merge `entries` into the stored map, replacing existing paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the vectors file cannot be written.
    pub async fn put_many(
        &self,
        project: &ProjectId,
        entries: impl IntoIterator<Item = (String, Vec<f32>)>,
    ) -> Result<usize> {
        let mut vectors = self.load(project).await;
        let mut written = 0;
        for (path, vector) in entries {
            vectors.insert(path, vector);
            written += 1;
        }
        self.store(project, &vectors).await?;
        Ok(written)
    }

    /// Cosine top-k over every stored vector, skipping `exclude`d paths.
    ///
    /// Stored vectors whose length differs from the query are skipped.
    pub async fn search(
        &self,
        project: &ProjectId,
        query: &[f32],
        k: usize,
        exclude: impl Fn(&str) -> bool,
    ) -> Vec<LocalHit> {
        let vectors = self.load(project).await;
        rank(&vectors, query, k, exclude, project)
    }
}

fn rank(
    vectors: &VectorMap,
    query: &[f32],
    k: usize,
    exclude: impl Fn(&str) -> bool,
    project: &ProjectId,
) -> Vec<LocalHit> {
    let mut skipped = 0usize;
    let mut hits: Vec<LocalHit> = vectors
        .iter()
        .filter(|(path, _)| !exclude(path))
        .filter(|(_, vector)| {
            let ok = vector.len() == query.len();
            if !ok {
                skipped += 1;
            }
            ok
        })
        .map(|(path, vector)| LocalHit {
            path: path.clone(),
            score: cosine_similarity(query, vector),
        })
        .collect();
    if skipped > 0 {
        tracing::warn!(
            project = %project,
            skipped,
            expected = query.len(),
            "local vectors with mismatched dimension ignored"
        );
    }
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, LocalIndex, ProjectId) {
        let dir = tempfile::tempdir().unwrap();
        let index = LocalIndex::new(ProjectStorage::new(dir.path()));
        (dir, index, ProjectId::new("p1").unwrap())
    }

    #[tokio::test]
    async fn identical_vectors_score_one() {
        let (_dir, index, project) = setup();
        let v = vec![0.2, 0.4, 0.4];
        index
            .put_many(&project, [("A".to_owned(), v.clone()), ("B".to_owned(), v.clone())])
            .await
            .unwrap();

        let hits = index.search(&project, &v, 5, |_| false).await;
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| (h.score - 1.0).abs() < 1e-5));
    }

    #[tokio::test]
    async fn empty_store_returns_no_hits() {
        let (_dir, index, project) = setup();
        assert!(index.search(&project, &[1.0], 3, |_| false).await.is_empty());
    }

    #[tokio::test]
    async fn ranks_excludes_and_truncates() {
        let (_dir, index, project) = setup();
        index
            .put_many(
                &project,
                [
                    ("near.py".to_owned(), vec![1.0, 0.1]),
                    ("far.py".to_owned(), vec![0.0, 1.0]),
                    ("__MACOSX/near.py".to_owned(), vec![1.0, 0.0]),
                    ("short.py".to_owned(), vec![1.0]),
                ],
            )
            .await
            .unwrap();

        let hits = index
            .search(&project, &[1.0, 0.0], 1, |p| p.contains("__MACOSX"))
            .await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "near.py");
    }

    #[tokio::test]
    async fn put_many_replaces_existing_path() {
        let (_dir, index, project) = setup();
        index
            .put_many(&project, [("a".to_owned(), vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .put_many(&project, [("a".to_owned(), vec![0.0, 1.0]), ("b".to_owned(), vec![1.0, 1.0])])
            .await
            .unwrap();
        let stored = index.load(&project).await;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored["a"], vec![0.0, 1.0]);
    }
}

//! Project indexing pipeline: read → classify → chunk → embed → store.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::capability::Capability;
use crate::chunker::{DEFAULT_WINDOW_LINES, chunk_source};
use crate::embedding::Embedder;
use crate::error::{IndexError, Result};
use crate::fallback::LocalIndex;
use crate::files::{FileSet, ProjectId};
use crate::languages::LanguageRegistry;
use crate::storage::{ProjectStorage, VectorMap};
use crate::vector::{IndexEntry, VectorIndex};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Line window used when a file yields no AST chunks.
    pub window_lines: usize,
    /// Files processed at once.
    pub concurrency: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            window_lines: DEFAULT_WINDOW_LINES,
            concurrency: 4,
        }
    }
}

/// Summary of an indexing run.
#[derive(Debug, Default, Serialize)]
pub struct IndexReport {
    pub files_scanned: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub chunks_created: usize,
    pub chunks_in_index: usize,
    pub vector_failures: usize,
    pub vector_dim: usize,
    pub duration_ms: u64,
}

/// Result of embedding a single path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedOutcome {
    pub vector_dim: usize,
    pub stored_in_index: bool,
}

struct FileOutcome {
    path: String,
    vector: Vec<f32>,
    chunks: usize,
    stored: Option<usize>,
}

/// Writes the manifest, the local whole-file index and, when configured, the
/// external vector index for a project.
#[derive(Debug, Clone)]
pub struct ProjectIndexer {
    storage: ProjectStorage,
    local: LocalIndex,
    embedder: Arc<Embedder>,
    vector: Capability<VectorIndex>,
    registry: Arc<LanguageRegistry>,
    config: IndexerConfig,
}

impl ProjectIndexer {
    #[must_use]
    pub fn new(
        storage: ProjectStorage,
        embedder: Arc<Embedder>,
        vector: Capability<VectorIndex>,
        registry: Arc<LanguageRegistry>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            local: LocalIndex::new(storage.clone()),
            storage,
            embedder,
            vector,
            registry,
            config,
        }
    }

    #[must_use]
    pub fn local(&self) -> &LocalIndex {
        &self.local
    }

    /// Index every file of `files` into `project`.
    ///
    /// The run replaces the previous snapshot: paths no longer in `files`
    /// disappear from both the local index and the vector namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest or local vectors cannot be written, or
    /// [`IndexError::DimensionMismatch`] if a chunk vector disagrees with the
    /// project namespace.
    pub async fn index_project(&self, project: &ProjectId, files: &FileSet) -> Result<IndexReport> {
        let start = std::time::Instant::now();
        let mut report = IndexReport {
            files_scanned: files.len(),
            ..IndexReport::default()
        };
        self.storage
            .write_manifest(project, files.paths())
            .await?;
        tracing::info!(project = %project, total = files.len(), "indexing started");
        if let Some(index) = self.vector.as_available()
            && let Err(e) = index.clear_project(project).await
        {
            tracing::warn!(project = %project, "failed to clear previous chunks: {e}");
        }

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for path in files.paths() {
            let this = self.clone();
            let project = project.clone();
            let files = files.clone();
            let path = path.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| IndexError::Other(e.to_string()))?;
                this.process_file(&project, &files, &path).await
            });
        }

        let mut vectors = Vec::new();
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(Some(outcome))) => {
                    report.files_indexed += 1;
                    report.chunks_created += outcome.chunks;
                    match outcome.stored {
                        Some(n) => report.chunks_in_index += n,
                        None if self.vector.is_available() => report.vector_failures += 1,
                        None => {}
                    }
                    report.vector_dim = outcome.vector.len();
                    vectors.push((outcome.path, outcome.vector));
                }
                Ok(Ok(None)) => report.files_skipped += 1,
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                    tasks.abort_all();
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    failure.get_or_insert(IndexError::Join(e));
                    tasks.abort_all();
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        let vectors: VectorMap = vectors.into_iter().collect();
        self.local.store(project, &vectors).await?;
        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            project = %project,
            indexed = report.files_indexed,
            skipped = report.files_skipped,
            chunks = report.chunks_created,
            duration_ms = report.duration_ms,
            "indexing finished"
        );
        Ok(report)
    }

    /// Re-embed one path and update both indexes.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::PathEscape`] if `path` is not a member of `files`,
    /// an IO error if it cannot be read, or a dimension mismatch.
    pub async fn embed_path(
        &self,
        project: &ProjectId,
        files: &FileSet,
        path: &str,
    ) -> Result<EmbedOutcome> {
        if !files.contains(path) {
            return Err(IndexError::PathEscape(path.to_owned()));
        }
        let Some(outcome) = self.process_file(project, files, path).await? else {
            return Err(IndexError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("unreadable file: {path}"),
            )));
        };
        let result = EmbedOutcome {
            vector_dim: outcome.vector.len(),
            stored_in_index: outcome.stored.is_some(),
        };
        self.local
            .put_many(project, [(outcome.path, outcome.vector)])
            .await?;
        Ok(result)
    }

    async fn process_file(
        &self,
        project: &ProjectId,
        files: &FileSet,
        path: &str,
    ) -> Result<Option<FileOutcome>> {
        let Some(content) = files.read_text_async(path).await else {
            tracing::debug!(project = %project, path, "skipping unreadable file");
            return Ok(None);
        };
        let lang = self.registry.classify(Path::new(path), &content);
        let chunks = chunk_source(lang, &content, path, self.config.window_lines);
        let vector = self.embedder.embed(&content).await;

        let stored = match self.vector.as_available() {
            Some(index) => {
                let mut entries = Vec::with_capacity(chunks.len());
                for chunk in &chunks {
                    let vector = self.embedder.embed(&chunk.text).await;
                    entries.push(IndexEntry {
                        chunk: chunk.clone(),
                        vector,
                    });
                }
                match replace_path(index, project, path, &entries).await {
                    Ok(n) => Some(n),
                    Err(e) if e.is_contract_violation() => return Err(e),
                    Err(e) => {
                        tracing::warn!(project = %project, path, "vector index write failed: {e}");
                        None
                    }
                }
            }
            None => None,
        };

        tracing::debug!(project = %project, path, chunks = chunks.len(), "file indexed");
        Ok(Some(FileOutcome {
            path: path.to_owned(),
            vector,
            chunks: chunks.len(),
            stored,
        }))
    }
}

async fn replace_path(
    index: &VectorIndex,
    project: &ProjectId,
    path: &str,
    entries: &[IndexEntry],
) -> Result<usize> {
    index.remove_path(project, path).await?;
    index.upsert(project, entries).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory_store::InMemoryVectorStore;
    use crate::vector_store::VectorStore;

    fn indexer(dir: &Path, vector: Capability<VectorIndex>) -> ProjectIndexer {
        ProjectIndexer::new(
            ProjectStorage::new(dir.join("store")),
            Arc::new(Embedder::stub(16)),
            vector,
            Arc::new(LanguageRegistry::default()),
            IndexerConfig::default(),
        )
    }

    fn project_files(dir: &Path) -> FileSet {
        let src = dir.join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("a.py"), "def a():\n    return 1\n").unwrap();
        std::fs::write(src.join("notes.md"), "# notes\n").unwrap();
        FileSet::new(&src, vec!["a.py".into(), "notes.md".into(), "gone.py".into()]).unwrap()
    }

    #[test]
    fn default_config() {
        let config = IndexerConfig::default();
        assert_eq!(config.window_lines, 80);
        assert_eq!(config.concurrency, 4);
    }

    #[tokio::test]
    async fn local_only_run_writes_manifest_and_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let files = project_files(dir.path());
        let idx = indexer(dir.path(), Capability::Unavailable);
        let project = ProjectId::new("p").unwrap();

        let report = idx.index_project(&project, &files).await.unwrap();
        assert_eq!(report.files_scanned, 3);
        assert_eq!(report.files_indexed, 2);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.vector_dim, 16);
        assert_eq!(report.vector_failures, 0);

        let stored = idx.local().load(&project).await;
        assert_eq!(stored.keys().collect::<Vec<_>>(), vec!["a.py", "notes.md"]);
        let manifest = idx.storage.read_manifest(&project).await.unwrap().unwrap();
        assert_eq!(manifest.len(), 3);
    }

    #[tokio::test]
    async fn vector_run_replaces_chunks_per_path() {
        let dir = tempfile::tempdir().unwrap();
        let files = project_files(dir.path());
        let store = Arc::new(InMemoryVectorStore::new());
        let index = VectorIndex::new(store.clone(), "codelens");
        let idx = indexer(dir.path(), Capability::Available(index));
        let project = ProjectId::new("p").unwrap();

        let first = idx.index_project(&project, &files).await.unwrap();
        assert!(first.chunks_in_index >= 2);
        idx.index_project(&project, &files).await.unwrap();
        assert_eq!(store.point_count("codelens-p"), first.chunks_in_index);
    }

    #[tokio::test]
    async fn reindex_drops_removed_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("a.py"), "def a():\n    return 1\n").unwrap();
        std::fs::write(src.join("old.py"), "def old():\n    return 2\n").unwrap();
        let store = Arc::new(InMemoryVectorStore::new());
        let index = VectorIndex::new(store.clone(), "codelens");
        let idx = indexer(dir.path(), Capability::Available(index.clone()));
        let project = ProjectId::new("p").unwrap();
        let scan = crate::files::ScanConfig::default();

        let before = FileSet::discover(&src, &scan).unwrap();
        idx.index_project(&project, &before).await.unwrap();
        assert_eq!(idx.local().load(&project).await.len(), 2);

        std::fs::remove_file(src.join("old.py")).unwrap();
        let after = FileSet::discover(&src, &scan).unwrap();
        let report = idx.index_project(&project, &after).await.unwrap();

        let stored = idx.local().load(&project).await;
        assert_eq!(stored.keys().collect::<Vec<_>>(), vec!["a.py"]);
        assert_eq!(store.point_count("codelens-p"), report.chunks_in_index);
        let hits = index
            .search(&project, &[0.0; 16], 10, Some("old.py"))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn dimension_mismatch_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let files = project_files(dir.path());
        let store = Arc::new(InMemoryVectorStore::new());
        store.ensure_collection("codelens-p", 3).await.unwrap();
        let idx = indexer(
            dir.path(),
            Capability::Available(VectorIndex::new(store, "codelens")),
        );
        let err = idx
            .index_project(&ProjectId::new("p").unwrap(), &files)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn embed_path_reports_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let files = project_files(dir.path());
        let idx = indexer(dir.path(), Capability::Unavailable);
        let project = ProjectId::new("p").unwrap();

        let outcome = idx.embed_path(&project, &files, "a.py").await.unwrap();
        assert_eq!(
            outcome,
            EmbedOutcome {
                vector_dim: 16,
                stored_in_index: false
            }
        );
        assert!(matches!(
            idx.embed_path(&project, &files, "other.py").await,
            Err(IndexError::PathEscape(_))
        ));
        assert!(matches!(
            idx.embed_path(&project, &files, "gone.py").await,
            Err(IndexError::Io(_))
        ));
    }
}

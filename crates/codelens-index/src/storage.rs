//! Per-project files owned by the index: `manifest.json` and `embeddings.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::files::ProjectId;

const MANIFEST_FILE: &str = "manifest.json";
const EMBEDDINGS_FILE: &str = "embeddings.json";

/// Path → whole-file vector, serialized as a flat JSON object.
pub type VectorMap = BTreeMap<String, Vec<f32>>;

/// Storage directory holding one subdirectory per project.
#[derive(Debug, Clone)]
pub struct ProjectStorage {
    root: PathBuf,
}

impl ProjectStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn project_dir(&self, project: &ProjectId) -> PathBuf {
        self.root.join(project.as_str())
    }

    #[must_use]
    pub fn manifest_path(&self, project: &ProjectId) -> PathBuf {
        self.project_dir(project).join(MANIFEST_FILE)
    }

    #[must_use]
    pub fn embeddings_path(&self, project: &ProjectId) -> PathBuf {
        self.project_dir(project).join(EMBEDDINGS_FILE)
    }

    /// Overwrite the manifest with `paths` as a pretty-printed JSON array.
    ///
    /// # Errors
    ///
    /// Returns an error if the project directory or file cannot be written.
    pub async fn write_manifest(&self, project: &ProjectId, paths: &[String]) -> Result<()> {
        tokio::fs::create_dir_all(self.project_dir(project)).await?;
        let body = serde_json::to_string_pretty(paths)?;
        tokio::fs::write(self.manifest_path(project), body).await?;
        Ok(())
    }

    /// Read the manifest. `None` when the project has never been indexed.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest exists but cannot be read or parsed.
    pub async fn read_manifest(&self, project: &ProjectId) -> Result<Option<Vec<String>>> {
        let path = self.manifest_path(project);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Load stored vectors. Missing file is empty; a corrupt file is logged and
    /// treated as empty.
    pub async fn load_vectors(&self, project: &ProjectId) -> VectorMap {
        let path = self.embeddings_path(project);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return VectorMap::new(),
            Err(e) => {
                tracing::warn!(project = %project, "failed to read local vectors: {e}");
                return VectorMap::new();
            }
        };
        match serde_json::from_str(&text) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(project = %project, "corrupt local vectors, ignoring: {e}");
                VectorMap::new()
            }
        }
    }

    /// Replace stored vectors wholesale.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn store_vectors(&self, project: &ProjectId, vectors: &VectorMap) -> Result<()> {
        tokio::fs::create_dir_all(self.project_dir(project)).await?;
        let body = serde_json::to_string(vectors)?;
        tokio::fs::write(self.embeddings_path(project), body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> ProjectId {
        ProjectId::new("demo").unwrap()
    }

    #[tokio::test]
    async fn manifest_roundtrip_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ProjectStorage::new(dir.path());
        assert!(storage.read_manifest(&project()).await.unwrap().is_none());

        let files = vec!["b.py".to_owned(), "a.py".to_owned()];
        storage.write_manifest(&project(), &files).await.unwrap();
        assert_eq!(storage.read_manifest(&project()).await.unwrap(), Some(files));

        let raw = std::fs::read_to_string(storage.manifest_path(&project())).unwrap();
        assert!(raw.starts_with("[\n"));
    }

    #[tokio::test]
    async fn corrupt_vectors_load_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ProjectStorage::new(dir.path());
        std::fs::create_dir_all(storage.project_dir(&project())).unwrap();
        std::fs::write(storage.embeddings_path(&project()), "{not json").unwrap();
        assert!(storage.load_vectors(&project()).await.is_empty());
    }

    #[tokio::test]
    async fn vectors_are_a_flat_object() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ProjectStorage::new(dir.path());
        let map = VectorMap::from([("a.py".to_owned(), vec![1.0, 0.5])]);
        storage.store_vectors(&project(), &map).await.unwrap();

        let raw = std::fs::read_to_string(storage.embeddings_path(&project())).unwrap();
        assert_eq!(raw, r#"{"a.py":[1.0,0.5]}"#);
        assert_eq!(storage.load_vectors(&project()).await, map);
    }
}

//! One discovered project: identity, files and import graph.

use std::path::{Path, PathBuf};

use anyhow::Context;
use codelens_index::deps::{self, DependencyGraph};
use codelens_index::files::{FileSet, ProjectId, ScanConfig};

#[derive(Debug, Clone)]
pub struct ProjectSnapshot {
    pub id: ProjectId,
    pub files: FileSet,
    pub graph: DependencyGraph,
}

impl ProjectSnapshot {
    /// Discover files under `root` and resolve their import edges.
    ///
    /// Without an explicit `id`, one is derived from the canonical root path.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be walked or `id` is invalid.
    pub fn discover(root: &Path, id: Option<&str>, scan: &ScanConfig) -> anyhow::Result<Self> {
        let id = match id {
            Some(id) => ProjectId::new(id)?,
            None => derive_project_id(root)?,
        };
        let files = FileSet::discover(root, scan)
            .with_context(|| format!("failed to scan {}", root.display()))?;
        let graph = deps::resolve(&files);
        tracing::info!(
            project = %id,
            files = files.len(),
            edges = graph.len(),
            "project discovered"
        );
        Ok(Self { id, files, graph })
    }
}

/// `<dir name>-<8 hex chars of blake3(canonical path)>`, sanitized.
///
/// # Errors
///
/// Returns an error if `root` cannot be canonicalized.
pub fn derive_project_id(root: &Path) -> anyhow::Result<ProjectId> {
    let canonical: PathBuf = root
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", root.display()))?;
    let hash = blake3::hash(canonical.to_string_lossy().as_bytes())
        .to_hex()
        .to_string();
    let name: String = canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(40)
        .collect();
    let id = if name.is_empty() {
        hash[..8].to_owned()
    } else {
        format!("{name}-{}", &hash[..8])
    };
    Ok(ProjectId::new(id)?)
}

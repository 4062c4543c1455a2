//! Project identity and the validated set of files in one snapshot.

use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Validated project identifier: ASCII alphanumerics, `-` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidProjectId`] for empty ids or ids with
    /// characters outside `[A-Za-z0-9_-]`.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(id))
        } else {
            Err(IndexError::InvalidProjectId(id))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory filters and limits applied when discovering files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub ignored_dirs: Vec<String>,
    /// Lower-case extensions including the dot.
    pub allowed_extensions: Vec<String>,
    /// Larger files are listed but never read.
    pub max_file_bytes: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| (*s).to_owned()).collect();
        Self {
            ignored_dirs: owned(&[
                ".git",
                "node_modules",
                ".next",
                "dist",
                "build",
                "out",
                "__pycache__",
                ".venv",
                "__MACOSX",
            ]),
            allowed_extensions: owned(&[
                ".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".py", ".go", ".rs", ".java",
                ".md", ".json", ".yml", ".yaml", ".toml",
            ]),
            max_file_bytes: 400_000,
        }
    }
}

impl ScanConfig {
    fn allows(&self, rel: &Path) -> bool {
        let ext_ok = rel
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| {
                let dotted = format!(".{}", e.to_ascii_lowercase());
                self.allowed_extensions.contains(&dotted)
            });
        ext_ok
            && !rel.components().any(|c| {
                c.as_os_str()
                    .to_str()
                    .is_some_and(|s| self.ignored_dirs.iter().any(|d| d == s))
            })
    }
}

/// Root directory plus the ordered relative paths of one project snapshot.
///
/// Every path is relative, uses `/` separators and stays inside the root.
#[derive(Debug, Clone)]
pub struct FileSet {
    root: PathBuf,
    paths: Vec<String>,
    members: HashSet<String>,
    max_file_bytes: u64,
}

impl FileSet {
    /// Build a file set from caller-supplied relative paths.
    ///
    /// Duplicates are dropped, keeping first occurrence order.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::PathEscape`] for empty, absolute, or `..` paths.
    pub fn new(root: impl Into<PathBuf>, paths: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut ordered = Vec::new();
        let mut members = HashSet::new();
        for raw in paths {
            let normalized = validate_relative(&raw)?;
            if members.insert(normalized.clone()) {
                ordered.push(normalized);
            }
        }
        Ok(Self {
            root: root.into(),
            paths: ordered,
            members,
            max_file_bytes: ScanConfig::default().max_file_bytes,
        })
    }

    /// Walk `root`, honoring `.gitignore`, the ignored directory list and the
    /// allowed extensions. Paths come back sorted.
    ///
    /// # Errors
    ///
    /// Returns an IO error if `root` is not a readable directory.
    pub fn discover(root: impl Into<PathBuf>, config: &ScanConfig) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(IndexError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("not a directory: {}", root.display()),
            )));
        }

        let ignored = config.ignored_dirs.clone();
        let mut paths: Vec<String> = ignore::WalkBuilder::new(&root)
            .hidden(false)
            .git_ignore(true)
            .filter_entry(move |e| {
                !(e.file_type().is_some_and(|ft| ft.is_dir())
                    && e.file_name().to_str().is_some_and(|n| ignored.iter().any(|d| d == n)))
            })
            .build()
            .flatten()
            .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
            .filter_map(|e| {
                let rel = e.path().strip_prefix(&root).ok()?.to_path_buf();
                config.allows(&rel).then(|| to_posix(&rel))
            })
            .collect();
        paths.sort();

        tracing::debug!(root = %root.display(), files = paths.len(), "discovered files");
        let mut set = Self::new(root, paths)?;
        set.max_file_bytes = config.max_file_bytes;
        Ok(set)
    }

    #[must_use]
    pub fn with_max_file_bytes(mut self, max: u64) -> Self {
        self.max_file_bytes = max;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    #[must_use]
    pub fn contains(&self, rel: &str) -> bool {
        self.members.contains(rel)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    #[must_use]
    pub fn absolute(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Read a member as lossy UTF-8. Unreadable or oversized files yield `None`.
    #[must_use]
    pub fn read_text(&self, rel: &str) -> Option<String> {
        let path = self.absolute(rel);
        let meta = std::fs::metadata(&path).ok()?;
        if !meta.is_file() || meta.len() > self.max_file_bytes {
            tracing::debug!(path = rel, "skipping unreadable or oversized file");
            return None;
        }
        let bytes = std::fs::read(&path).ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Async variant of [`FileSet::read_text`].
    pub async fn read_text_async(&self, rel: &str) -> Option<String> {
        let path = self.absolute(rel);
        let meta = tokio::fs::metadata(&path).await.ok()?;
        if !meta.is_file() || meta.len() > self.max_file_bytes {
            tracing::debug!(path = rel, "skipping unreadable or oversized file");
            return None;
        }
        let bytes = tokio::fs::read(&path).await.ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Normalize a caller-supplied relative path, rejecting anything that could
/// resolve outside the root.
fn validate_relative(raw: &str) -> Result<String> {
    let unified = raw.replace('\\', "/");
    let mut parts = Vec::new();
    for component in Path::new(&unified).components() {
        match component {
            Component::Normal(p) => parts.push(p.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(IndexError::PathEscape(raw.to_owned()));
            }
        }
    }
    if parts.is_empty() {
        return Err(IndexError::PathEscape(raw.to_owned()));
    }
    Ok(parts.join("/"))
}

fn to_posix(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

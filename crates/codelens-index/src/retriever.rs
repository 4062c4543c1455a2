//! Ranked retrieval: vector index first, local whole-file index as fallback.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::deps::DependencyGraph;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::fallback::LocalIndex;
use crate::files::{FileSet, ProjectId};
use crate::vector::{VectorHit, VectorIndex};

/// Retrieval tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum characters of chunk or file text carried in a hit.
    pub snippet_chars: usize,
    /// Glob patterns for paths never returned.
    pub exclude_patterns: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            snippet_chars: 400,
            exclude_patterns: vec!["*__MACOSX*".into(), "._*".into(), "*/._*".into()],
        }
    }
}

/// Compiled exclusion globs. Invalid patterns are logged and dropped.
#[derive(Debug, Clone, Default)]
pub struct PathExclusions {
    patterns: Vec<glob::Pattern>,
}

impl PathExclusions {
    #[must_use]
    pub fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!(pattern = %p, "ignoring invalid exclude pattern: {e}");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }
}

/// Chunk provenance, only present on hits from the vector index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkMeta {
    pub language: String,
    pub raw_id: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalHit {
    pub path: String,
    pub score: f32,
    pub snippet: String,
    pub line: usize,
    pub end_line: Option<usize>,
    pub chunk: Option<ChunkMeta>,
}

/// Answers similarity queries for one project snapshot.
#[derive(Debug, Clone)]
pub struct Retriever {
    embedder: Arc<Embedder>,
    vector: Capability<VectorIndex>,
    local: LocalIndex,
    snippet_chars: usize,
    exclusions: PathExclusions,
}

impl Retriever {
    #[must_use]
    pub fn new(
        embedder: Arc<Embedder>,
        vector: Capability<VectorIndex>,
        local: LocalIndex,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            vector,
            local,
            snippet_chars: config.snippet_chars,
            exclusions: PathExclusions::new(&config.exclude_patterns),
        }
    }

    #[must_use]
    pub fn exclusions(&self) -> &PathExclusions {
        &self.exclusions
    }

    /// Rank fragments of `project` for `query`.
    ///
    /// With an `anchor`, the vector index is searched per path over the anchor
    /// and its direct import targets. Every hit comes from a single source: the
    /// vector index when it answers, otherwise the local whole-file index.
    pub async fn retrieve(
        &self,
        project: &ProjectId,
        files: &FileSet,
        graph: &DependencyGraph,
        query: &str,
        k: usize,
        anchor: Option<&str>,
    ) -> Vec<RetrievalHit> {
        let query_vector = self.embedder.embed(query).await;

        if let Some(index) = self.vector.as_available() {
            let scope = anchor.map(|a| scope_paths(a, graph));
            match self
                .primary(index, project, &query_vector, k, scope.as_deref())
                .await
            {
                Ok(hits) => return hits,
                Err(e) => {
                    tracing::warn!(project = %project, "vector retrieval failed, using local index: {e}");
                }
            }
        } else {
            tracing::debug!(project = %project, "no vector index configured, using local index");
        }

        self.fallback(project, files, &query_vector, k).await
    }

    async fn primary(
        &self,
        index: &VectorIndex,
        project: &ProjectId,
        query_vector: &[f32],
        k: usize,
        scope: Option<&[String]>,
    ) -> Result<Vec<RetrievalHit>> {
        let mut raw: Vec<VectorHit> = Vec::new();
        match scope {
            Some(paths) => {
                let per_path = (k / paths.len().max(1)).max(2);
                for path in paths {
                    raw.extend(index.search(project, query_vector, per_path, Some(path)).await?);
                }
            }
            None => raw = index.search(project, query_vector, k, None).await?,
        }

        let mut hits: Vec<RetrievalHit> = raw
            .into_iter()
            .filter(|h| !self.exclusions.is_excluded(&h.path))
            .map(|h| RetrievalHit {
                snippet: truncate_chars(&h.code, self.snippet_chars),
                line: h.start_line,
                end_line: Some(h.end_line),
                chunk: Some(ChunkMeta {
                    language: h.language,
                    raw_id: h.raw_id,
                    content_hash: h.content_hash,
                }),
                path: h.path,
                score: h.score,
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        let mut seen = HashSet::new();
        hits.retain(|h| seen.insert((h.path.clone(), h.line, h.end_line)));
        Ok(hits)
    }

    async fn fallback(
        &self,
        project: &ProjectId,
        files: &FileSet,
        query_vector: &[f32],
        k: usize,
    ) -> Vec<RetrievalHit> {
        let ranked = self
            .local
            .search(project, query_vector, k, |p| self.exclusions.is_excluded(p))
            .await;
        let mut hits = Vec::with_capacity(ranked.len());
        for hit in ranked {
            let content = files.read_text_async(&hit.path).await.unwrap_or_default();
            hits.push(RetrievalHit {
                snippet: truncate_chars(&content, self.snippet_chars),
                path: hit.path,
                score: hit.score,
                line: 1,
                end_line: None,
                chunk: None,
            });
        }
        hits
    }
}

/// Anchor first, then its direct import targets, without duplicates.
fn scope_paths(anchor: &str, graph: &DependencyGraph) -> Vec<String> {
    let mut scope = vec![anchor.to_owned()];
    for neighbor in graph.neighbors(anchor) {
        if !scope.iter().any(|p| p == neighbor) {
            scope.push(neighbor.to_owned());
        }
    }
    scope
}

/// Prefix of `text` holding at most `max` characters.
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_owned(),
        None => text.to_owned(),
    }
}

//! File- and repository-scoped review on top of retrieval.
//!
//! Without a generation provider a file review is a single placeholder
//! comment and a repository review carries only heuristic findings.

mod parse;
mod prompt;

pub use parse::{comments_from, findings_from, normalize_lines, parse_json_object};
pub use prompt::{build_context, file_messages, repo_prompt};

use std::time::Duration;

use codelens_index::Capability;
use codelens_index::heuristics::{self, UnreferencedSymbol};
use codelens_index::retriever::{RetrievalHit, Retriever, truncate_chars};
use codelens_llm::LlmProvider;
use codelens_llm::any::AnyProvider;
use codelens_llm::provider::Message;
use serde::Serialize;

use crate::intent::{ReviewIntent, parse_intent};
use crate::project::ProjectSnapshot;

/// Files beyond this many get no representative snippet in a repo review.
const REPO_SAMPLE_FILES: usize = 50;
const REPO_SAMPLE_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewComment {
    pub file: String,
    pub line: usize,
    pub severity: String,
    pub summary: String,
    pub recommendation: String,
    pub explanation: String,
    pub suggestion: String,
    pub optional_patch: String,
    pub lines: Vec<usize>,
    pub cross_file: bool,
}

impl ReviewComment {
    fn placeholder(summary: &str) -> Self {
        Self {
            file: "general".to_owned(),
            line: 0,
            severity: "info".to_owned(),
            summary: summary.to_owned(),
            recommendation: "Configure an [llm] provider, model and API key to enable structured review generation.".to_owned(),
            explanation: String::new(),
            suggestion: String::new(),
            optional_patch: String::new(),
            lines: Vec::new(),
            cross_file: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub issue: String,
    pub files: Vec<String>,
    pub lines: Vec<usize>,
    pub severity: String,
    pub explanation: String,
    pub suggestion: String,
    pub optional_patch: Option<String>,
    pub cross_file: bool,
}

impl From<UnreferencedSymbol> for Finding {
    fn from(symbol: UnreferencedSymbol) -> Self {
        Self {
            issue: format!(
                "Function or method '{}' is defined but never referenced",
                symbol.name
            ),
            explanation: format!("'{}' appears to be unused across the repository.", symbol.name),
            suggestion: "Remove if dead code or ensure it is called where intended.".to_owned(),
            severity: "info".to_owned(),
            optional_patch: None,
            cross_file: true,
            files: symbol.files,
            lines: symbol.lines,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReview {
    pub project_id: String,
    pub query: String,
    pub comments: Vec<ReviewComment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepoReview {
    pub project_id: String,
    pub query: String,
    pub intent: ReviewIntent,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone)]
pub struct Reviewer {
    retriever: Retriever,
    generator: Capability<AnyProvider>,
    timeout: Duration,
}

impl Reviewer {
    #[must_use]
    pub fn new(retriever: Retriever, generator: Capability<AnyProvider>, timeout: Duration) -> Self {
        Self {
            retriever,
            generator,
            timeout,
        }
    }

    /// Review `query` against the top `k` fragments, scoped to `anchor` and
    /// its imports when given.
    pub async fn review_file(
        &self,
        project: &ProjectSnapshot,
        query: &str,
        k: usize,
        anchor: Option<&str>,
    ) -> FileReview {
        let hits = self
            .retriever
            .retrieve(&project.id, &project.files, &project.graph, query, k, anchor)
            .await;
        let context = build_context(&hits);

        let comments = if self.generator.is_available() {
            let raw = self.generate(&project.id.to_string(), &file_messages(query, &context)).await;
            match raw.as_deref().and_then(parse_json_object) {
                Some(map) => comments_from(&map),
                None => {
                    tracing::warn!(project = %project.id, "no usable review output, returning placeholder");
                    vec![ReviewComment::placeholder(
                        "Review generation failed; returning placeholder review.",
                    )]
                }
            }
        } else {
            tracing::debug!(project = %project.id, "no llm provider, returning placeholder review");
            vec![ReviewComment::placeholder(
                "No LLM key provided; returning placeholder review.",
            )]
        };

        FileReview {
            project_id: project.id.to_string(),
            query: query.to_owned(),
            comments,
        }
    }

    /// Repository-wide review: top `k` fragments plus one head snippet per
    /// file, model findings, then the unreferenced-symbol heuristic.
    pub async fn review_repo(&self, project: &ProjectSnapshot, query: &str, k: usize) -> RepoReview {
        let intent = parse_intent(query);
        let mut hits = self
            .retriever
            .retrieve(&project.id, &project.files, &project.graph, query, k, None)
            .await;
        hits.extend(sample_files(project).await);
        let exclusions = self.retriever.exclusions();
        hits.retain(|h| !exclusions.is_excluded(&h.path));

        let mut findings = Vec::new();
        if self.generator.is_available() {
            let prompt = repo_prompt(query, &build_context(&hits), &intent);
            let raw = self
                .generate(&project.id.to_string(), &[Message::user(prompt)])
                .await;
            if let Some(map) = raw.as_deref().and_then(parse_json_object) {
                findings = findings_from(&map);
            } else {
                tracing::warn!(project = %project.id, "no usable repo review output");
            }
        } else {
            tracing::debug!(project = %project.id, "no llm provider, heuristic findings only");
        }

        let files = project.files.clone();
        match tokio::task::spawn_blocking(move || heuristics::scan(&files)).await {
            Ok(symbols) => findings.extend(symbols.into_iter().map(Finding::from)),
            Err(e) => tracing::warn!(project = %project.id, "heuristic scan failed: {e}"),
        }
        findings.retain(|f| !f.files.iter().any(|p| exclusions.is_excluded(p)));

        RepoReview {
            project_id: project.id.to_string(),
            query: query.to_owned(),
            intent,
            findings,
        }
    }

    async fn generate(&self, project: &str, messages: &[Message]) -> Option<String> {
        let provider = self.generator.as_available()?;
        match tokio::time::timeout(self.timeout, provider.chat(messages)).await {
            Ok(Ok(raw)) => Some(raw),
            Ok(Err(e)) => {
                tracing::warn!(project, provider = provider.name(), "generation failed: {e}");
                None
            }
            Err(_) => {
                tracing::warn!(
                    project,
                    provider = provider.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "generation timed out"
                );
                None
            }
        }
    }
}

async fn sample_files(project: &ProjectSnapshot) -> Vec<RetrievalHit> {
    let mut samples = Vec::new();
    for path in project.files.paths().iter().take(REPO_SAMPLE_FILES) {
        let Some(content) = project.files.read_text_async(path).await else {
            continue;
        };
        if content.is_empty() {
            continue;
        }
        samples.push(RetrievalHit {
            path: path.clone(),
            score: 0.0,
            snippet: truncate_chars(&content, REPO_SAMPLE_CHARS),
            line: 1,
            end_line: None,
            chunk: None,
        });
    }
    samples
}

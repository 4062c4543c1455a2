use std::fmt::Write;

use codelens_index::retriever::RetrievalHit;
use codelens_llm::provider::Message;

use crate::intent::ReviewIntent;

const FILE_SYSTEM: &str = "You are an AI code reviewer. Return a JSON object whose key \"comments\" \
holds an array. Each item: {file, line, lines (array), severity \
(info|warning|error|low|medium|high|critical), summary, explanation, recommendation, \
suggestion, optional_patch, cross_file}.";

const FILE_EXAMPLE: &str = r#"Respond ONLY with JSON, e.g. {"comments":[{"file":"file.ts","line":12,"lines":[12,13],"severity":"warning","summary":"...","explanation":"...","recommendation":"...","suggestion":"...","optional_patch":"...","cross_file":false}]}."#;

const REPO_CHECKS: &[&str] = &[
    "credentials validated before login success",
    "authentication flags/configs enforced",
    "tokens are validated and expired",
    "security utilities are used",
    "cross-file data flows are consistent",
];

/// Render hits as `File:` blocks separated by blank lines.
#[must_use]
pub fn build_context(hits: &[RetrievalHit]) -> String {
    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let _ = write!(out, "File: {}", hit.path);
        match hit.end_line {
            Some(end) => {
                let _ = write!(out, " lines {}-{}", hit.line, end);
            }
            None => {
                let _ = write!(out, " line {}", hit.line);
            }
        }
        let _ = write!(out, " (score {:.3})\n{}", hit.score, hit.snippet);
    }
    out
}

#[must_use]
pub fn file_messages(query: &str, context: &str) -> Vec<Message> {
    vec![
        Message::system(FILE_SYSTEM),
        Message::user(format!("{FILE_EXAMPLE}\nQuery: {query}\n\nContext:\n{context}")),
    ]
}

#[must_use]
pub fn repo_prompt(query: &str, context: &str, intent: &ReviewIntent) -> String {
    let list = |items: &[String]| {
        if items.is_empty() {
            "none".to_owned()
        } else {
            items.join(", ")
        }
    };
    let checks: String = REPO_CHECKS.iter().map(|c| format!("- {c}\n")).collect();

    format!(
        "You are an AI code reviewer performing a repository-level review.

Analyze the provided code context and return structured findings.
Context snippets may come from multiple files. Always reference file paths and line ranges.
If an issue spans multiple files, set cross_file=true and include all affected files.
If issues require understanding interactions across files, reconstruct the execution flow before reporting.

Return JSON with key \"findings\" as an array.
Each finding must include: issue, files, lines, severity, explanation, suggestion, optional_patch, cross_file.

Review query:
{query}

Review intent:
{name}

Intent focus (non-exhaustive):
categories: {categories}
paths: {paths}
languages: {languages}

Intent checks to verify:
{checks}
Context (grouped by file):
{context}
",
        name = intent.name,
        categories = list(&intent.categories),
        paths = list(&intent.focus_paths),
        languages = list(&intent.languages),
    )
}

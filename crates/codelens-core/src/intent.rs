//! Keyword-based review intent. Advisory only: it steers the repository
//! review prompt and never filters retrieval.

use serde::Serialize;

const CATEGORIES: &[(&str, &[&str])] = &[
    ("security", &["security", "auth", "token", "jwt", "secret"]),
    ("performance", &["performance", "slow", "optimiz", "latency"]),
    ("reliability", &["reliability", "error", "exception", "resilien"]),
    ("style", &["style", "lint", "format", "readability"]),
];

const FOCUS_PATHS: &[&str] = &[
    "api",
    "routes",
    "controllers",
    "db",
    "database",
    "auth",
    "config",
    "frontend",
    "backend",
];

const LANGUAGES: &[(&str, &[&str])] = &[
    ("python", &["python", "py"]),
    ("typescript", &["typescript", "ts", "tsx"]),
    ("javascript", &["javascript", "js", "jsx", "node"]),
    ("go", &["go", "golang"]),
    ("java", &["java"]),
    ("rust", &["rust", "rs"]),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewIntent {
    pub name: String,
    pub categories: Vec<String>,
    pub focus_paths: Vec<String>,
    pub languages: Vec<String>,
}

/// Derive an intent from a free-text review query.
///
/// Categories and focus paths match on word prefixes ("auth" matches
/// "authentication"); language tags need a whole word so "go" does not fire
/// on "good".
#[must_use]
pub fn parse_intent(query: &str) -> ReviewIntent {
    let lowered = query.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has_prefix = |stem: &str| words.iter().any(|w| w.starts_with(stem));
    let has_word = |word: &str| words.contains(&word);

    let categories = CATEGORIES
        .iter()
        .filter(|(_, stems)| stems.iter().any(|s| has_prefix(s)))
        .map(|(name, _)| (*name).to_owned())
        .collect();
    let focus_paths = FOCUS_PATHS
        .iter()
        .filter(|token| has_prefix(token))
        .map(|token| (*token).to_owned())
        .collect();
    let languages = LANGUAGES
        .iter()
        .filter(|(_, tags)| tags.iter().any(|t| has_word(t)))
        .map(|(name, _)| (*name).to_owned())
        .collect();

    ReviewIntent {
        name: query.to_owned(),
        categories,
        focus_paths,
        languages,
    }
}

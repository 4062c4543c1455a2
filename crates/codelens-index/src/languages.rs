//! Language detection and tree-sitter grammar registry.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tree_sitter::Parser;

/// Supported language with its tree-sitter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
    Java,
    Rust,
    Bash,
    Toml,
    Json,
    Markdown,
}

impl Lang {
    /// Identifier used in index payloads and config.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Go => "go",
            Self::Java => "java",
            Self::Rust => "rust",
            Self::Bash => "bash",
            Self::Toml => "toml",
            Self::Json => "json",
            Self::Markdown => "markdown",
        }
    }

    /// Get the tree-sitter grammar. Returns `None` if the
    /// corresponding feature is not enabled.
    #[must_use]
    pub fn grammar(self) -> Option<tree_sitter::Language> {
        match self {
            #[cfg(feature = "lang-python")]
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            #[cfg(feature = "lang-js")]
            Self::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            #[cfg(feature = "lang-go")]
            Self::Go => Some(tree_sitter_go::LANGUAGE.into()),
            #[cfg(feature = "lang-java")]
            Self::Java => Some(tree_sitter_java::LANGUAGE.into()),
            #[cfg(feature = "lang-rust")]
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            #[cfg(feature = "lang-config")]
            Self::Bash => Some(tree_sitter_bash::LANGUAGE.into()),
            #[cfg(feature = "lang-config")]
            Self::Toml => Some(tree_sitter_toml_ng::LANGUAGE.into()),
            #[cfg(feature = "lang-config")]
            Self::Json => Some(tree_sitter_json::LANGUAGE.into()),
            #[cfg(feature = "lang-config")]
            Self::Markdown => Some(tree_sitter_md::LANGUAGE.into()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Named node kinds that become chunks. Nested matches are all emitted.
    #[must_use]
    pub fn extractable_kinds(self) -> &'static [&'static str] {
        match self {
            Self::Python => &["function_definition", "class_definition"],
            Self::JavaScript | Self::TypeScript | Self::Tsx => &[
                "function_declaration",
                "class_declaration",
                "method_definition",
            ],
            Self::Go => &["function_declaration", "method_declaration"],
            Self::Java => &[
                "class_declaration",
                "method_declaration",
                "constructor_declaration",
            ],
            Self::Rust => &[
                "function_item",
                "struct_item",
                "enum_item",
                "trait_item",
                "impl_item",
                "mod_item",
            ],
            Self::Bash | Self::Toml | Self::Json | Self::Markdown => &[],
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Payload tag for an optional language.
#[must_use]
pub fn lang_tag(lang: Option<Lang>) -> &'static str {
    lang.map_or("unknown", Lang::id)
}

/// Parse `content` and report whether the tree is free of syntax errors.
///
/// Any setup failure (grammar disabled, version mismatch, parser refusal)
/// counts as "does not parse".
#[must_use]
pub fn parses_cleanly(lang: Lang, content: &str) -> bool {
    let Some(grammar) = lang.grammar() else {
        return false;
    };
    let mut parser = Parser::new();
    if parser.set_language(&grammar).is_err() {
        return false;
    }
    parser
        .parse(content, None)
        .is_some_and(|tree| !tree.root_node().has_error())
}

/// Extension, shebang and parse-probe rules for classifying files.
///
/// Every table can be replaced from the `[languages]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageRegistry {
    /// Lower-case extension including the dot, e.g. `".py"`.
    pub extensions: HashMap<String, Lang>,
    /// Substrings looked up in a `#!` first line.
    pub shebangs: BTreeMap<Lang, Vec<String>>,
    /// Languages probed by parsing, in order.
    pub fallback: Vec<Lang>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        let extensions = [
            (".py", Lang::Python),
            (".pyi", Lang::Python),
            (".js", Lang::JavaScript),
            (".jsx", Lang::JavaScript),
            (".mjs", Lang::JavaScript),
            (".cjs", Lang::JavaScript),
            (".ts", Lang::TypeScript),
            (".mts", Lang::TypeScript),
            (".cts", Lang::TypeScript),
            (".tsx", Lang::Tsx),
            (".go", Lang::Go),
            (".java", Lang::Java),
            (".rs", Lang::Rust),
            (".sh", Lang::Bash),
            (".bash", Lang::Bash),
            (".toml", Lang::Toml),
            (".json", Lang::Json),
            (".md", Lang::Markdown),
        ]
        .into_iter()
        .map(|(ext, lang)| (ext.to_owned(), lang))
        .collect();

        let shebangs = BTreeMap::from([
            (Lang::Python, vec!["python".to_owned()]),
            (Lang::JavaScript, vec!["node".to_owned(), "deno".to_owned()]),
            (
                Lang::Bash,
                vec!["bash".to_owned(), "/sh".to_owned(), "zsh".to_owned()],
            ),
        ]);

        Self {
            extensions,
            shebangs,
            fallback: vec![Lang::Python, Lang::JavaScript],
        }
    }
}

impl LanguageRegistry {
    /// Classify a file: extension, then shebang, then clean-parse probe.
    #[must_use]
    pub fn classify(&self, path: &Path, content: &str) -> Option<Lang> {
        if let Some(lang) = self.by_extension(path) {
            return Some(lang);
        }
        if let Some(lang) = self.by_shebang(content) {
            return Some(lang);
        }
        self.fallback
            .iter()
            .copied()
            .find(|&lang| parses_cleanly(lang, content))
    }

    #[must_use]
    pub fn by_extension(&self, path: &Path) -> Option<Lang> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.extensions.get(&format!(".{ext}")).copied()
    }

    fn by_shebang(&self, content: &str) -> Option<Lang> {
        let first = content.lines().next()?;
        if !first.starts_with("#!") {
            return None;
        }
        self.shebangs
            .iter()
            .find(|(_, tokens)| tokens.iter().any(|t| first.contains(t.as_str())))
            .map(|(lang, _)| *lang)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_lookup_is_case_insensitive() {
        let reg = LanguageRegistry::default();
        assert_eq!(reg.classify(Path::new("a/B.PY"), ""), Some(Lang::Python));
        assert_eq!(reg.classify(Path::new("x.tsx"), ""), Some(Lang::Tsx));
        assert_eq!(reg.classify(Path::new("Main.java"), ""), Some(Lang::Java));
    }

    #[test]
    fn shebang_wins_without_extension() {
        let reg = LanguageRegistry::default();
        assert_eq!(
            reg.classify(Path::new("bin/tool"), "#!/usr/bin/env python3\nprint(1)\n"),
            Some(Lang::Python)
        );
        assert_eq!(
            reg.classify(Path::new("run"), "#!/bin/sh\necho hi\n"),
            Some(Lang::Bash)
        );
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn fallback_parse_accepts_clean_source() {
        let reg = LanguageRegistry {
            fallback: vec![Lang::Python],
            ..LanguageRegistry::default()
        };
        assert_eq!(
            reg.classify(Path::new("Makefile.in"), "x = 1\n"),
            Some(Lang::Python)
        );
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn fallback_parse_rejects_broken_source() {
        let reg = LanguageRegistry {
            fallback: vec![Lang::Python],
            ..LanguageRegistry::default()
        };
        assert_eq!(reg.classify(Path::new("notes"), "def (:\n"), None);
    }

    #[test]
    fn unknown_without_fallback() {
        let reg = LanguageRegistry {
            fallback: Vec::new(),
            ..LanguageRegistry::default()
        };
        assert_eq!(reg.classify(Path::new("file.xyz"), "whatever"), None);
        assert_eq!(lang_tag(None), "unknown");
    }

    #[test]
    fn registry_deserializes_overrides() {
        let reg: LanguageRegistry = serde_json::from_str(
            r#"{"extensions": {".pyw": "python"}, "shebangs": {"javascript": ["bun"]}, "fallback": []}"#,
        )
        .unwrap();
        assert_eq!(reg.classify(Path::new("app.pyw"), ""), Some(Lang::Python));
        assert_eq!(
            reg.classify(Path::new("s"), "#!/usr/bin/env bun\n"),
            Some(Lang::JavaScript)
        );
        assert_eq!(reg.classify(Path::new("x.py"), ""), None);
    }

    #[test]
    fn extractable_kinds_config_empty() {
        assert!(Lang::Toml.extractable_kinds().is_empty());
        assert!(Lang::Markdown.extractable_kinds().is_empty());
        assert!(Lang::Java.extractable_kinds().contains(&"constructor_declaration"));
    }

    #[test]
    fn grammar_returns_some_for_enabled_features() {
        #[cfg(feature = "lang-python")]
        assert!(Lang::Python.grammar().is_some());
        #[cfg(feature = "lang-js")]
        {
            assert!(Lang::JavaScript.grammar().is_some());
            assert!(Lang::Tsx.grammar().is_some());
        }
        #[cfg(feature = "lang-java")]
        assert!(Lang::Java.grammar().is_some());
    }
}

//! Repo-level "defined but never referenced" scan.
//!
//! Symbols come from per-language declaration patterns and references are
//! plain substring containment, so a name that happens to appear in an
//! unrelated identifier counts as referenced. Under-reporting is accepted.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::deps::Family;
use crate::files::FileSet;

static JS_RULES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"function\s+(\w+)",
        r"const\s+(\w+)\s*=\s*\(",
        r"(\w+)\s*=\s*\(.*?\)\s*=>",
        r"class\s+(\w+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static PY_RULES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"def\s+(\w+)\s*\(", r"class\s+(\w+)\s*[:(]"]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

static GO_RULES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"func\s+(\w+)\s*\(", r"func\s+\([^)]*\)\s*(\w+)\s*\("]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

static JAVA_RULES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:class|interface)\s+(\w+)",
        r"(?:public|private|protected)\s+(?:static\s+)?[\w<>\[\]]+\s+(\w+)\s*\(",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// A symbol no file outside its own definitions mentions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreferencedSymbol {
    pub name: String,
    /// Defining files, sorted.
    pub files: Vec<String>,
    /// 1-based definition lines across all defining files, sorted.
    pub lines: Vec<usize>,
}

#[derive(Default)]
struct Definition {
    files: BTreeSet<String>,
    lines: BTreeSet<usize>,
}

/// Declared symbol names with their 1-based line, in source order.
#[must_use]
pub fn symbols(path: &str, content: &str) -> Vec<(String, usize)> {
    let rules: &[Regex] = match Family::for_path(path) {
        Some(Family::JavaScript) => JS_RULES.as_slice(),
        Some(Family::Python) => PY_RULES.as_slice(),
        Some(Family::Go) => GO_RULES.as_slice(),
        Some(Family::Java) => JAVA_RULES.as_slice(),
        None => return Vec::new(),
    };
    let mut found: Vec<(usize, String)> = rules
        .iter()
        .flat_map(|re| re.captures_iter(content))
        .filter_map(|caps| caps.get(1))
        .map(|m| (m.start(), m.as_str().to_owned()))
        .collect();
    found.sort();
    found.dedup();
    found
        .into_iter()
        .map(|(offset, name)| (name, line_of(content, offset)))
        .collect()
}

/// Flag symbols mentioned only by the files that define them.
#[must_use]
pub fn scan(files: &FileSet) -> Vec<UnreferencedSymbol> {
    let contents: Vec<(&str, String)> = files
        .paths()
        .iter()
        .filter_map(|p| files.read_text(p).map(|text| (p.as_str(), text)))
        .collect();
    scan_contents(&contents)
}

/// [`scan`] over already-loaded `(path, content)` pairs.
#[must_use]
pub fn scan_contents<S: AsRef<str>>(contents: &[(&str, S)]) -> Vec<UnreferencedSymbol> {
    let mut defs: BTreeMap<String, Definition> = BTreeMap::new();
    for (path, text) in contents {
        for (name, line) in symbols(path, text.as_ref()) {
            let def = defs.entry(name).or_default();
            def.files.insert((*path).to_owned());
            def.lines.insert(line);
        }
    }

    defs.into_iter()
        .filter(|(name, def)| {
            !contents.iter().any(|(path, text)| {
                !def.files.contains(*path) && text.as_ref().contains(name.as_str())
            })
        })
        .map(|(name, def)| UnreferencedSymbol {
            name,
            files: def.files.into_iter().collect(),
            lines: def.lines.into_iter().collect(),
        })
        .collect()
}

fn line_of(content: &str, offset: usize) -> usize {
    content[..offset].bytes().filter(|&b| b == b'\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(found: &[UnreferencedSymbol]) -> Vec<&str> {
        found.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn python_reference_in_other_file_clears_symbol() {
        let contents = [
            ("a.py", "def foo(): pass"),
            ("b.py", "from a import foo\nfoo()"),
            ("c.py", "def bar(): pass"),
        ];
        let found = scan_contents(&contents);
        assert_eq!(names(&found), vec!["bar"]);
        assert_eq!(found[0].files, vec!["c.py"]);
        assert_eq!(found[0].lines, vec![1]);
    }

    #[test]
    fn js_patterns() {
        let src = "function alpha() {}\nconst beta = (x) => x;\nclass Gamma {}\nlet delta = (a, b) => a;\n";
        let got: Vec<_> = symbols("m.js", src).into_iter().map(|(n, _)| n).collect();
        assert!(got.contains(&"alpha".to_owned()));
        assert!(got.contains(&"beta".to_owned()));
        assert!(got.contains(&"Gamma".to_owned()));
        assert!(got.contains(&"delta".to_owned()));
    }

    #[test]
    fn go_method_receivers() {
        let src = "package x\n\nfunc Top() {}\n\nfunc (s *Server) Serve() {}\n";
        let got = symbols("s.go", src);
        assert!(got.contains(&("Top".to_owned(), 3)));
        assert!(got.contains(&("Serve".to_owned(), 5)));
    }

    #[test]
    fn java_classes_and_methods() {
        let src = "public class Svc {\n  private static int count() { return 0; }\n}\n";
        let got: Vec<_> = symbols("Svc.java", src).into_iter().map(|(n, _)| n).collect();
        assert!(got.contains(&"Svc".to_owned()));
        assert!(got.contains(&"count".to_owned()));
    }

    #[test]
    fn self_reference_only_is_flagged() {
        let contents = [("a.py", "def helper():\n    return helper\n"), ("b.py", "x = 1\n")];
        assert_eq!(names(&scan_contents(&contents)), vec!["helper"]);
    }

    #[test]
    fn unsupported_files_contribute_mentions_only() {
        let contents = [("a.py", "def run(): pass"), ("README.md", "call run() first")];
        assert!(scan_contents(&contents).is_empty());
    }

    #[test]
    fn scan_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("c.py"), "def bar(): pass").unwrap();
        let set = FileSet::new(dir.path(), vec!["c.py".into(), "missing.py".into()]).unwrap();
        assert_eq!(names(&scan(&set)), vec!["bar"]);
    }
}

//! Pattern-based import extraction and resolution to file set members.
//!
//! Resolution is syntactic only: no build files, no module search paths, no
//! type information. It narrows, it never fails.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::files::FileSet;

static JS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:import|require)\s*\(?\s*(?:[\w\{\}\*\s,]+from\s*)?['"]([^'"]+)['"]"#).unwrap()
});

static PY_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:from\s+([a-zA-Z0-9_\.]+)\s+import|import\s+([a-zA-Z0-9_\.]+))").unwrap()
});

static GO_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*import\s+"([^"]+)"|^\s*"([^"]+)""#).unwrap()
});

static JAVA_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*import\s+([a-zA-Z0-9\._]+);").unwrap()
});

const JS_EXTENSIONS: [&str; 4] = [".ts", ".tsx", ".js", ".jsx"];

/// Import family, chosen by file extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    JavaScript,
    Python,
    Go,
    Java,
}

impl Family {
    #[must_use]
    pub fn for_path(path: &str) -> Option<Self> {
        let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "js" | "jsx" | "ts" | "tsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "py" => Some(Self::Python),
            "go" => Some(Self::Go),
            "java" => Some(Self::Java),
            _ => None,
        }
    }
}

/// Directed "src imports dst" edge between two distinct file set members.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DependencyEdge {
    pub src: String,
    pub dst: String,
}

/// Deduplicated, sorted edge set for one project snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DependencyGraph {
    edges: BTreeSet<DependencyEdge>,
}

impl DependencyGraph {
    #[must_use]
    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Direct outgoing targets of `path`, sorted.
    #[must_use]
    pub fn neighbors(&self, path: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.src == path)
            .map(|e| e.dst.as_str())
            .collect()
    }

    #[must_use]
    pub fn contains(&self, src: &str, dst: &str) -> bool {
        self.edges.contains(&DependencyEdge {
            src: src.to_owned(),
            dst: dst.to_owned(),
        })
    }
}

impl FromIterator<DependencyEdge> for DependencyGraph {
    fn from_iter<I: IntoIterator<Item = DependencyEdge>>(iter: I) -> Self {
        Self {
            edges: iter.into_iter().collect(),
        }
    }
}

/// Resolve import edges across the whole file set.
///
/// Unreadable files and references that match nothing are skipped.
#[must_use]
pub fn resolve(files: &FileSet) -> DependencyGraph {
    let mut edges = BTreeSet::new();
    for src in files.paths() {
        let Some(family) = Family::for_path(src) else {
            continue;
        };
        let Some(content) = files.read_text(src) else {
            continue;
        };
        for dst in resolve_file(family, src, &content, |p| files.contains(p)) {
            if dst != *src {
                edges.insert(DependencyEdge {
                    src: src.clone(),
                    dst,
                });
            }
        }
    }
    tracing::debug!(edges = edges.len(), "dependency edges resolved");
    DependencyGraph { edges }
}

/// Resolve every import in one file to the members accepted by `exists`.
#[must_use]
pub fn resolve_file(
    family: Family,
    src: &str,
    content: &str,
    exists: impl Fn(&str) -> bool,
) -> BTreeSet<String> {
    let dir = parent_dir(src);
    let mut targets = BTreeSet::new();
    match family {
        Family::JavaScript => {
            for caps in JS_IMPORT.captures_iter(content) {
                if let Some(m) = caps.get(1)
                    && let Some(hit) = resolve_js(dir, m.as_str(), &exists)
                {
                    targets.insert(hit);
                }
            }
        }
        Family::Python => {
            for caps in PY_IMPORT.captures_iter(content) {
                if let Some(m) = caps.get(1).or_else(|| caps.get(2))
                    && let Some(hit) = resolve_python(dir, m.as_str(), &exists)
                {
                    targets.insert(hit);
                }
            }
        }
        Family::Go => {
            for caps in GO_IMPORT.captures_iter(content) {
                // Both alternatives are candidates; whichever resolves wins.
                for m in [caps.get(1), caps.get(2)].into_iter().flatten() {
                    if let Some(hit) = resolve_go(dir, m.as_str(), &exists) {
                        targets.insert(hit);
                    }
                }
            }
        }
        Family::Java => {
            for caps in JAVA_IMPORT.captures_iter(content) {
                if let Some(m) = caps.get(1) {
                    let candidate = format!("{}.java", m.as_str().replace('.', "/"));
                    if let Some(norm) = normalize(&candidate)
                        && exists(&norm)
                    {
                        targets.insert(norm);
                    }
                }
            }
        }
    }
    targets
}

fn resolve_js(dir: &str, module: &str, exists: &impl Fn(&str) -> bool) -> Option<String> {
    let base = normalize(&join(dir, module))?;
    let has_ext = base
        .rsplit('/')
        .next()
        .is_some_and(|name| name.contains('.'));
    if has_ext && exists(&base) {
        return Some(base);
    }
    JS_EXTENSIONS
        .iter()
        .map(|ext| format!("{base}{ext}"))
        .chain(JS_EXTENSIONS.iter().map(|ext| format!("{base}/index{ext}")))
        .find(|candidate| exists(candidate))
}

fn resolve_python(dir: &str, module: &str, exists: &impl Fn(&str) -> bool) -> Option<String> {
    let dots = module.chars().take_while(|&c| c == '.').count();
    let dotted = &module[dots..];
    if dotted.is_empty() {
        return None;
    }
    let candidate = format!("{}.py", dotted.replace('.', "/"));

    if let Some(abs) = normalize(&candidate)
        && exists(&abs)
    {
        return Some(abs);
    }

    let mut base = dir.to_owned();
    for _ in 1..dots {
        base = join(&base, "..");
    }
    normalize(&join(&base, &candidate)).filter(|rel| exists(rel))
}

fn resolve_go(dir: &str, module: &str, exists: &impl Fn(&str) -> bool) -> Option<String> {
    let candidate = if module.starts_with('.') {
        normalize(&join(&join(dir, module), "index.go"))?
    } else {
        normalize(&format!("{module}.go"))?
    };
    exists(&candidate).then_some(candidate)
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

fn join(dir: &str, rel: &str) -> String {
    if dir.is_empty() {
        rel.to_owned()
    } else {
        format!("{dir}/{rel}")
    }
}

/// Lexically normalize a `/`-separated path. `None` if it climbs above the root.
fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn members(paths: &[&str]) -> HashSet<String> {
        paths.iter().map(|p| (*p).to_owned()).collect()
    }

    fn run(family: Family, src: &str, content: &str, set: &HashSet<String>) -> Vec<String> {
        resolve_file(family, src, content, |p| set.contains(p))
            .into_iter()
            .collect()
    }

    #[test]
    fn normalize_rejects_escape() {
        assert_eq!(normalize("a/./b/../c.ts").as_deref(), Some("a/c.ts"));
        assert_eq!(normalize("../x.ts"), None);
        assert_eq!(normalize("a/../../x.ts"), None);
    }

    #[test]
    fn js_extension_order_prefers_ts() {
        let set = members(&["src/app.ts", "src/util.ts", "src/util.js", "src/view.jsx"]);
        let content = "import { a } from './util'\nimport View from \"./view\";\nconst x = require('./missing');";
        assert_eq!(
            run(Family::JavaScript, "src/app.ts", content, &set),
            vec!["src/util.ts", "src/view.jsx"]
        );
    }

    #[test]
    fn js_side_effect_import_and_explicit_extension() {
        let set = members(&["lib/a.js", "lib/b.js", "lib/style.css.js"]);
        let content = "import './b.js';\nrequire(\"./style.css\")";
        assert_eq!(
            run(Family::JavaScript, "lib/a.js", content, &set),
            vec!["lib/b.js", "lib/style.css.js"]
        );
    }

    #[test]
    fn js_parent_and_escaping_references() {
        let set = members(&["src/a/x.ts", "src/shared.ts"]);
        let content = "import s from '../shared'\nimport t from '../../../outside'";
        assert_eq!(
            run(Family::JavaScript, "src/a/x.ts", content, &set),
            vec!["src/shared.ts"]
        );
    }

    #[test]
    fn python_absolute_then_relative() {
        let set = members(&["pkg/util.py", "pkg/sub/helpers.py", "pkg/sub/mod.py", "core.py"]);
        let content = "import core\nfrom helpers import x\nfrom pkg.util import y\nimport os\n";
        assert_eq!(
            run(Family::Python, "pkg/sub/mod.py", content, &set),
            vec!["core.py", "pkg/sub/helpers.py", "pkg/util.py"]
        );
    }

    #[test]
    fn python_leading_dots_climb() {
        let set = members(&["pkg/base.py", "pkg/sub/mod.py", "pkg/sub/sibling.py"]);
        let content = "from .sibling import a\nfrom ..base import b\n";
        assert_eq!(
            run(Family::Python, "pkg/sub/mod.py", content, &set),
            vec!["pkg/base.py", "pkg/sub/sibling.py"]
        );
    }

    #[test]
    fn go_both_pattern_alternatives() {
        let set = members(&["cmd/main.go", "cmd/lib/index.go", "util/strings.go"]);
        let content = "package main\n\nimport \"./lib\"\nimport (\n\t\"fmt\"\n\t\"util/strings\"\n)\n";
        assert_eq!(
            run(Family::Go, "cmd/main.go", content, &set),
            vec!["cmd/lib/index.go", "util/strings.go"]
        );
    }

    #[test]
    fn java_dotted_to_path() {
        let set = members(&["com/acme/App.java", "com/acme/util/Strings.java"]);
        let content = "package com.acme;\nimport com.acme.util.Strings;\nimport java.util.List;\n";
        assert_eq!(
            run(Family::Java, "com/acme/App.java", content, &set),
            vec!["com/acme/util/Strings.java"]
        );
    }

    #[test]
    fn family_by_extension() {
        assert_eq!(Family::for_path("a/b.MJS"), Some(Family::JavaScript));
        assert_eq!(Family::for_path("x.rs"), None);
        assert_eq!(Family::for_path("Makefile"), None);
    }

    #[test]
    fn resolve_drops_self_edges_and_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "import a\nimport b\n").unwrap();
        std::fs::write(dir.path().join("b.py"), "x = 1\n").unwrap();
        let set = FileSet::new(
            dir.path(),
            vec!["a.py".into(), "b.py".into(), "ghost.py".into()],
        )
        .unwrap();

        let graph = resolve(&set);
        assert_eq!(graph.len(), 1);
        assert!(graph.contains("a.py", "b.py"));
        assert_eq!(graph.neighbors("a.py"), vec!["b.py"]);
        assert!(graph.neighbors("b.py").is_empty());
    }

    #[test]
    fn resolve_is_order_independent() {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in [
            ("a.py", "import b\nimport c\n"),
            ("b.py", "import c\n"),
            ("c.py", "import a\n"),
        ] {
            std::fs::write(dir.path().join(name), body).unwrap();
        }
        let forward =
            FileSet::new(dir.path(), vec!["a.py".into(), "b.py".into(), "c.py".into()]).unwrap();
        let backward =
            FileSet::new(dir.path(), vec!["c.py".into(), "b.py".into(), "a.py".into()]).unwrap();
        let first = resolve(&forward);
        assert_eq!(first, resolve(&backward));
        assert_eq!(first, resolve(&forward));
        assert!(first.edges().all(|e| e.src != e.dst));
    }
}

//! AST-based chunk extraction via tree-sitter with line-window fallback.

use tree_sitter::{Node, Parser};

use crate::languages::Lang;

/// Default maximum lines per fallback window.
pub const DEFAULT_WINDOW_LINES: usize = 80;

/// One line-ranged fragment of a source file.
///
/// Lines are 1-based and inclusive; `start_line <= end_line` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub path: String,
    pub language: Option<Lang>,
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content_hash: String,
}

impl Chunk {
    fn new(
        path: &str,
        language: Option<Lang>,
        text: &str,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        Self {
            path: path.to_owned(),
            language,
            content_hash: blake3_hex(text),
            text: text.to_owned(),
            start_line,
            end_line: end_line.max(start_line),
        }
    }

    /// Stable key used in index payloads, e.g. `src/a.py:3-9`.
    #[must_use]
    pub fn raw_id(&self) -> String {
        format!("{}:{}-{}", self.path, self.start_line, self.end_line)
    }
}

/// Extract one chunk per named node whose kind is extractable for `lang`.
///
/// Returns an empty vector when the language has no grammar or extractable
/// kinds, or when the parse tree contains any syntax error.
#[must_use]
pub fn extract(lang: Lang, text: &str, path: &str) -> Vec<Chunk> {
    let kinds = lang.extractable_kinds();
    if kinds.is_empty() {
        return Vec::new();
    }
    let Some(grammar) = lang.grammar() else {
        return Vec::new();
    };
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&grammar) {
        tracing::debug!(path, language = %lang, "set_language failed: {e}");
        return Vec::new();
    }
    let Some(tree) = parser.parse(text, None) else {
        return Vec::new();
    };
    let root = tree.root_node();
    if root.has_error() {
        tracing::debug!(path, language = %lang, "syntax errors, skipping AST extraction");
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut stack: Vec<Node> = vec![root];
    while let Some(node) = stack.pop() {
        if kinds.contains(&node.kind()) {
            chunks.push(Chunk::new(
                path,
                Some(lang),
                &text[node.byte_range()],
                node.start_position().row + 1,
                node.end_position().row + 1,
            ));
        }
        let child_count = u32::try_from(node.named_child_count()).unwrap_or(u32::MAX);
        // Reverse push keeps pre-order output in document order.
        for i in (0..child_count).rev() {
            if let Some(child) = node.named_child(i) {
                stack.push(child);
            }
        }
    }
    chunks
}

/// Split `text` into consecutive windows of at most `max_lines` lines.
///
/// Line terminators stay with their line, so concatenating the chunk texts
/// reproduces `text` exactly. Empty input yields a single empty chunk at
/// `base_line`.
#[must_use]
pub fn chunk_by_lines(
    text: &str,
    max_lines: usize,
    base_line: usize,
    path: &str,
    lang: Option<Lang>,
) -> Vec<Chunk> {
    let max_lines = max_lines.max(1);
    let base_line = base_line.max(1);
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    if lines.is_empty() {
        return vec![Chunk::new(path, lang, text, base_line, base_line)];
    }

    lines
        .chunks(max_lines)
        .enumerate()
        .map(|(i, window)| {
            let start = base_line + i * max_lines;
            let end = start + window.len() - 1;
            Chunk::new(path, lang, &window.concat(), start, end)
        })
        .collect()
}

/// AST chunks when available, otherwise line windows. Never empty.
#[must_use]
pub fn chunk_source(lang: Option<Lang>, text: &str, path: &str, max_lines: usize) -> Vec<Chunk> {
    if let Some(lang) = lang {
        let chunks = extract(lang, text, path);
        if !chunks.is_empty() {
            return chunks;
        }
    }
    chunk_by_lines(text, max_lines, 1, path, lang)
}

pub(crate) fn blake3_hex(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn empty_text_yields_single_chunk_at_base() {
        let chunks = chunk_by_lines("", 80, 5, "a.txt", None);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 5);
        assert_eq!(chunks[0].end_line, 5);
        assert!(chunks[0].text.is_empty());
    }

    #[test]
    fn short_text_is_one_window() {
        let chunks = chunk_by_lines("a\nb\nc", 80, 1, "a.txt", None);
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 3));
    }

    #[test]
    fn windows_have_contiguous_ranges() {
        let text: String = (1..=7).map(|i| format!("line{i}\n")).collect();
        let chunks = chunk_by_lines(&text, 3, 1, "a.txt", Some(Lang::Toml));
        let ranges: Vec<_> = chunks.iter().map(|c| (c.start_line, c.end_line)).collect();
        assert_eq!(ranges, vec![(1, 3), (4, 6), (7, 7)]);
        assert!(chunks.iter().all(|c| c.language == Some(Lang::Toml)));
    }

    #[test]
    fn raw_id_format() {
        let chunk = &chunk_by_lines("x\n", 80, 1, "src/a.py", None)[0];
        assert_eq!(chunk.raw_id(), "src/a.py:1-1");
        assert_eq!(chunk.content_hash, blake3_hex("x\n"));
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn nested_python_nodes_are_all_emitted() {
        let src = "class A:\n    def m(self):\n        return 1\n\ndef f():\n    pass\n";
        let chunks = extract(Lang::Python, src, "a.py");
        let ranges: Vec<_> = chunks.iter().map(|c| (c.start_line, c.end_line)).collect();
        assert_eq!(ranges, vec![(1, 3), (2, 3), (5, 6)]);
        assert!(chunks[1].text.starts_with("def m"));
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn syntax_error_yields_nothing_then_windows() {
        let src = "def broken(:\n    pass\n";
        assert!(extract(Lang::Python, src, "a.py").is_empty());
        let chunks = chunk_source(Some(Lang::Python), src, "a.py", 80);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, src);
        assert_eq!(chunks[0].language, Some(Lang::Python));
    }

    #[cfg(feature = "lang-java")]
    #[test]
    fn java_class_and_members() {
        let src = "class A {\n  A() {}\n  void run() {}\n}\n";
        let chunks = extract(Lang::Java, src, "A.java");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 4);
    }

    #[cfg(feature = "lang-js")]
    #[test]
    fn js_methods_inside_class() {
        let src = "function top() {}\nclass K {\n  go() { return 1; }\n}\n";
        let chunks = extract(Lang::JavaScript, src, "k.js");
        let kinds: Vec<_> = chunks.iter().map(|c| c.start_line).collect();
        assert_eq!(kinds, vec![1, 2, 3]);
    }

    #[test]
    fn config_language_falls_back_to_windows() {
        let chunks = chunk_source(Some(Lang::Json), "{\"a\": 1}\n", "a.json", 80);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
    }

    #[test]
    fn unknown_language_still_chunks() {
        let chunks = chunk_source(None, "", "README", 80);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].language.is_none());
    }

    proptest! {
        #[test]
        fn line_windows_are_lossless(text in "[a-z \\n]{0,400}", max in 1usize..20) {
            let chunks = chunk_by_lines(&text, max, 1, "p", None);
            prop_assert!(!chunks.is_empty());
            let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
            prop_assert_eq!(joined, text);
            let mut expected_start = 1;
            for c in &chunks {
                prop_assert!(1 <= c.start_line && c.start_line <= c.end_line);
                prop_assert_eq!(c.start_line, expected_start);
                expected_start = c.end_line + 1;
            }
        }
    }
}

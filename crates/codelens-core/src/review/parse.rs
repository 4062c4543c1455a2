//! Lenient decoding of model output into comments and findings.

use serde_json::{Map, Value};

use super::{Finding, ReviewComment};

/// Parse `raw` as a JSON object, retrying on the outermost `{...}` span so
/// prose or code fences around the payload are tolerated.
#[must_use]
pub fn parse_json_object(raw: &str) -> Option<Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str(raw) {
        return Some(map);
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&raw[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

#[must_use]
pub fn comments_from(map: &Map<String, Value>) -> Vec<ReviewComment> {
    let Some(Value::Array(items)) = map.get("comments") else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|item| {
            let recommendation = text(item, "recommendation").unwrap_or_default();
            ReviewComment {
                file: text(item, "file").unwrap_or_else(|| "unknown".to_owned()),
                line: item.get("line").and_then(as_line).unwrap_or(0),
                severity: text(item, "severity").unwrap_or_else(|| "info".to_owned()),
                summary: text(item, "summary").unwrap_or_default(),
                explanation: text(item, "explanation").unwrap_or_default(),
                suggestion: text(item, "suggestion").unwrap_or_else(|| recommendation.clone()),
                recommendation,
                optional_patch: text(item, "optional_patch").unwrap_or_default(),
                lines: item.get("lines").map(normalize_lines).unwrap_or_default(),
                cross_file: item
                    .get("cross_file")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            }
        })
        .collect()
}

#[must_use]
pub fn findings_from(map: &Map<String, Value>) -> Vec<Finding> {
    let Some(Value::Array(items)) = map.get("findings") else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|item| {
            let files = match item.get("files") {
                Some(Value::String(s)) => vec![s.clone()],
                Some(Value::Array(list)) => list
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect(),
                _ => Vec::new(),
            };
            let cross_file = item
                .get("cross_file")
                .and_then(Value::as_bool)
                .unwrap_or(files.len() > 1);
            Finding {
                issue: text(item, "issue").unwrap_or_default(),
                lines: item.get("lines").map(normalize_lines).unwrap_or_default(),
                severity: text(item, "severity").unwrap_or_else(|| "info".to_owned()),
                explanation: text(item, "explanation").unwrap_or_default(),
                suggestion: text(item, "suggestion").unwrap_or_default(),
                optional_patch: text(item, "optional_patch"),
                cross_file,
                files,
            }
        })
        .collect()
}

/// Accepts `[3, "4"]`, `"3-5,9"` and similar; a range contributes its two
/// endpoints. Anything unparseable is dropped.
#[must_use]
pub fn normalize_lines(value: &Value) -> Vec<usize> {
    match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .flat_map(|token| match token.split_once('-') {
                Some((start, end)) => match (parse_digits(start), parse_digits(end)) {
                    (Some(a), Some(b)) => vec![a, b],
                    _ => Vec::new(),
                },
                None => parse_digits(token).into_iter().collect(),
            })
            .collect(),
        Value::Array(items) => items.iter().filter_map(as_line).collect(),
        _ => as_line(value).into_iter().collect(),
    }
}

fn as_line(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => parse_digits(s),
        _ => None,
    }
}

fn parse_digits(s: &str) -> Option<usize> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn text(item: &Map<String, Value>, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_plain_and_wrapped_json() {
        assert!(parse_json_object(r#"{"comments": []}"#).is_some());
        let wrapped = "Here you go:\n```json\n{\"findings\": [{\"issue\": \"x\"}]}\n```";
        let map = parse_json_object(wrapped).unwrap();
        assert_eq!(findings_from(&map).len(), 1);
    }

    #[test]
    fn rejects_garbage_and_arrays() {
        assert!(parse_json_object("no json here").is_none());
        assert!(parse_json_object("} backwards {").is_none());
        assert!(parse_json_object("[1, 2]").is_none());
        assert!(parse_json_object("{ broken").is_none());
    }

    #[test]
    fn comment_defaults() {
        let map = parse_json_object(
            r#"{"comments":[{"summary":"s","recommendation":"r","line":"12","lines":[12,"13",-1]}]}"#,
        )
        .unwrap();
        let c = &comments_from(&map)[0];
        assert_eq!(c.file, "unknown");
        assert_eq!(c.line, 12);
        assert_eq!(c.severity, "info");
        assert_eq!(c.suggestion, "r");
        assert_eq!(c.lines, vec![12, 13]);
        assert!(!c.cross_file);
    }

    #[test]
    fn finding_normalization() {
        let map = json!({
            "findings": [
                {"issue": "a", "files": "x.py", "lines": "3-5, 9, abc"},
                {"issue": "b", "files": ["x.py", "y.py"], "lines": [1, "2"], "severity": "high"},
                {"issue": "c", "files": ["x.py", "y.py"], "cross_file": false},
                "not an object"
            ]
        });
        let found = findings_from(map.as_object().unwrap());
        assert_eq!(found.len(), 3);

        assert_eq!(found[0].files, vec!["x.py"]);
        assert_eq!(found[0].lines, vec![3, 5, 9]);
        assert_eq!(found[0].severity, "info");
        assert!(!found[0].cross_file);
        assert!(found[0].optional_patch.is_none());

        assert_eq!(found[1].lines, vec![1, 2]);
        assert!(found[1].cross_file);
        assert_eq!(found[1].severity, "high");

        assert!(!found[2].cross_file);
    }

    #[test]
    fn missing_keys_yield_nothing() {
        let map = parse_json_object(r#"{"other": 1}"#).unwrap();
        assert!(comments_from(&map).is_empty());
        assert!(findings_from(&map).is_empty());
    }
}

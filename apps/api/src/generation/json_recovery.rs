//! Recovers a JSON object from free-form model output.
//!
//! Models are told to answer with bare JSON but often wrap it in prose, code
//! fences, or leave trailing commas. Recovery runs an ordered chain of pure
//! strategies and stops at the first that yields an object. If none does,
//! the caller gets an error; content is never fabricated.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// A recovery strategy: raw model text in, parsed JSON object out.
pub type Strategy = fn(&str) -> Option<Value>;

/// Tried in order.
pub const STRATEGIES: &[(&str, Strategy)] = &[
    ("brace_scan", brace_scan),
    ("pattern_extraction", pattern_extraction),
    ("outer_slice", outer_slice),
];

/// Fields a candidate must carry for pattern extraction to accept it.
const CORE_FIELDS: &[&str] = &["title", "problem", "solution"];

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("trailing comma pattern is valid"));

// Brace-balanced object with at most one level of nested objects.
static OBJECT_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(?:[^{}]|\{[^{}]*\})*\}").expect("object pattern is valid")
});

#[derive(Debug, Error, PartialEq, Eq)]
#[error("no JSON object could be recovered from model output ({chars} chars)")]
pub struct RecoveryError {
    pub chars: usize,
}

/// Runs every strategy in order and returns the first object recovered.
pub fn recover_json(text: &str) -> Result<Value, RecoveryError> {
    for (name, strategy) in STRATEGIES {
        if let Some(value) = strategy(text) {
            debug!("Recovered model JSON via {name}");
            return Ok(value);
        }
    }
    Err(RecoveryError {
        chars: text.chars().count(),
    })
}

/// Collapses whitespace runs and strips trailing commas before `}` or `]`.
pub fn normalize(candidate: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(candidate.trim(), " ");
    TRAILING_COMMA.replace_all(&collapsed, "$1").into_owned()
}

fn parse_object(candidate: &str) -> Option<Value> {
    serde_json::from_str::<Value>(&normalize(candidate))
        .ok()
        .filter(Value::is_object)
}

fn has_core_fields(value: &Value) -> bool {
    CORE_FIELDS.iter().all(|field| {
        value
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty())
    })
}

/// The first balanced top-level `{...}` span. Braces inside JSON string
/// literals are skipped once the scan is inside an object.
fn first_balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn brace_scan(text: &str) -> Option<Value> {
    first_balanced_object(text).and_then(parse_object)
}

pub fn pattern_extraction(text: &str) -> Option<Value> {
    let mut candidates: Vec<&str> = OBJECT_LIKE.find_iter(text).map(|m| m.as_str()).collect();
    candidates.sort_by_key(|c| std::cmp::Reverse(c.len()));

    candidates
        .into_iter()
        .filter_map(parse_object)
        .find(has_core_fields)
}

pub fn outer_slice(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_object(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_embedded_object_in_prose() {
        let text = r#"Here is your idea: {"title":"X","problem":"Y","solution":"Z","revenue_streams":["a"]} Hope it helps!"#;
        let value = brace_scan(text).unwrap();
        assert_eq!(value["title"], "X");
        assert_eq!(value["solution"], "Z");
        assert_eq!(recover_json(text).unwrap(), value);
    }

    #[test]
    fn test_trailing_comma_is_stripped() {
        assert_eq!(brace_scan(r#"{"title":"X",}"#).unwrap(), json!({"title": "X"}));
        assert_eq!(
            recover_json("{\"tags\": [\"a\", \"b\",\n],\n}").unwrap(),
            json!({"tags": ["a", "b"]})
        );
    }

    #[test]
    fn test_no_brace_fails_every_strategy() {
        let text = "I'm sorry, I can't help with that request.";
        for (name, strategy) in STRATEGIES {
            assert!(strategy(text).is_none(), "{name} should not recover anything");
        }
        assert!(recover_json(text).is_err());
    }

    #[test]
    fn test_code_fenced_output() {
        let text = "```json\n{\n  \"title\": \"Fenced\",\n  \"problem\": \"p\",\n  \"solution\": \"s\"\n}\n```";
        assert_eq!(recover_json(text).unwrap()["title"], "Fenced");
    }

    #[test]
    fn test_braces_inside_strings_do_not_end_scan() {
        let text = r#"{"title":"Use {curly} braces","problem":"p","solution":"s"}"#;
        assert_eq!(brace_scan(text).unwrap()["title"], "Use {curly} braces");
    }

    #[test]
    fn test_nested_object_is_kept_whole() {
        let text = r#"Sure! {"title":"T","problem":"P","solution":"S","validation_data":{"market_trends":["x"],"competitor_analysis":"c","demand_indicators":[]}}"#;
        let value = recover_json(text).unwrap();
        assert_eq!(value["validation_data"]["competitor_analysis"], "c");
    }

    #[test]
    fn test_pattern_extraction_skips_earlier_broken_object() {
        // The first balanced span is not JSON, so brace_scan gives up.
        let text = r#"Draft: {title: oops} Final: {"title":"Real","problem":"P","solution":"S"}"#;
        assert!(brace_scan(text).is_none());
        let value = pattern_extraction(text).unwrap();
        assert_eq!(value["title"], "Real");
        assert_eq!(recover_json(text).unwrap()["title"], "Real");
    }

    #[test]
    fn test_pattern_extraction_requires_core_fields() {
        let text = r#"{bad} {"title":"Only title"}"#;
        assert!(pattern_extraction(text).is_none());
    }

    #[test]
    fn test_unbalanced_text_recovers_nothing() {
        // Unbalanced leading brace defeats the scan and the slice; deep nesting defeats the pattern.
        let text = r#"{ {"title":"T","problem":"P","solution":"S","x":{"y":{"z":1}}}"#;
        assert!(brace_scan(text).is_none());
        assert!(pattern_extraction(text).is_none());
        assert!(outer_slice(text).is_none());
        assert!(recover_json(text).is_err());
    }

    #[test]
    fn test_outer_slice_handles_deep_nesting() {
        let text = r#"note } {"title":"T","problem":"P","solution":"S","x":{"y":{"z":1}}}"#;
        assert!(pattern_extraction(text).is_none());
        assert_eq!(outer_slice(text).unwrap()["x"]["y"]["z"], 1);
    }

    #[test]
    fn test_arrays_are_not_accepted_as_objects() {
        assert!(recover_json("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("{\n  \"a\":\t1 ,\n}"), "{ \"a\": 1 }");
    }
}

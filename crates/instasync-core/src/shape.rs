//! Response-shape normalization.
//!
//! Upstream list endpoints have returned records as a bare array, under
//! `data`, under `campaigns`, under `results`, or under some other key
//! (`items` for v2 lists). [`ShapeNormalizer`] tries an ordered list of
//! [`ExtractStrategy`]s and returns the first non-empty match.

use serde::Serialize;
use serde_json::Value;

/// Body key carrying the cursor for the next page.
pub const NEXT_CURSOR_FIELD: &str = "next_starting_after";

/// One way of locating the record array in a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractStrategy {
    /// The body itself is the array.
    TopLevelArray,
    /// The array lives under a named top-level key.
    Field(&'static str),
    /// The first non-empty array-valued top-level property, in document
    /// order.
    FirstArrayField,
}

impl ExtractStrategy {
    fn apply<'a>(&self, body: &'a Value) -> Option<(&'a Vec<Value>, String)> {
        match self {
            Self::TopLevelArray => body.as_array().map(|a| (a, "top-level array".into())),
            Self::Field(key) => body
                .get(*key)
                .and_then(Value::as_array)
                .map(|a| (a, format!(".{key}"))),
            Self::FirstArrayField => body.as_object().and_then(|map| {
                map.iter().find_map(|(k, v)| {
                    v.as_array()
                        .filter(|a| !a.is_empty())
                        .map(|a| (a, format!(".{k}")))
                })
            }),
        }
    }
}

/// Summary of a response body, used by the connection test and debug
/// endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ShapeSummary {
    /// JSON type of the body (`object`, `array`, `string`, ...).
    pub kind: &'static str,
    pub is_array: bool,
    /// Top-level keys, in document order. Empty for non-objects.
    pub keys: Vec<String>,
    /// Which strategy produced records, if any.
    pub matched: Option<String>,
    pub record_count: usize,
    pub next_cursor: Option<String>,
    /// First record, truncated to 500 characters.
    pub sample: Option<String>,
}

const SAMPLE_LIMIT: usize = 500;

#[derive(Debug, Clone)]
pub struct ShapeNormalizer {
    strategies: Vec<ExtractStrategy>,
}

impl Default for ShapeNormalizer {
    fn default() -> Self {
        Self::new(vec![
            ExtractStrategy::TopLevelArray,
            ExtractStrategy::Field("data"),
            ExtractStrategy::Field("campaigns"),
            ExtractStrategy::Field("results"),
            ExtractStrategy::FirstArrayField,
        ])
    }
}

impl ShapeNormalizer {
    pub fn new(strategies: Vec<ExtractStrategy>) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &[ExtractStrategy] {
        &self.strategies
    }

    fn locate<'a>(&self, body: &'a Value) -> Option<(&'a Vec<Value>, String)> {
        self.strategies
            .iter()
            .filter_map(|s| s.apply(body))
            .find(|(records, _)| !records.is_empty())
    }

    /// Records in `body`. Empty when nothing matched or every match was an
    /// empty array.
    pub fn extract(&self, body: &Value) -> Vec<Value> {
        self.locate(body)
            .map(|(records, _)| records.clone())
            .unwrap_or_default()
    }

    pub fn describe(&self, body: &Value) -> ShapeSummary {
        let located = self.locate(body);
        ShapeSummary {
            kind: json_kind(body),
            is_array: body.is_array(),
            keys: body
                .as_object()
                .map(|m| m.keys().cloned().collect())
                .unwrap_or_default(),
            matched: located.as_ref().map(|(_, how)| how.clone()),
            record_count: located.as_ref().map(|(r, _)| r.len()).unwrap_or(0),
            next_cursor: next_cursor(body),
            sample: located
                .and_then(|(records, _)| records.first())
                .map(|first| truncate(&first.to_string(), SAMPLE_LIMIT)),
        }
    }
}

/// Cursor for the next page. Missing, null or empty means the sequence
/// has ended.
pub fn next_cursor(body: &Value) -> Option<String> {
    match body.get(NEXT_CURSOR_FIELD)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_known_shape_yields_the_same_records() {
        let n = ShapeNormalizer::default();
        let records = vec![json!({"id": "a", "status": 1}), json!({"id": "b", "status": 2})];
        let array = Value::Array(records.clone());

        assert_eq!(n.extract(&array), records);
        assert_eq!(n.extract(&json!({ "data": array })), records);
        assert_eq!(n.extract(&json!({ "campaigns": array })), records);
        assert_eq!(n.extract(&json!({ "results": array })), records);
        assert!(n.extract(&json!({"unexpectedKey": "not an array"})).is_empty());
    }

    #[test]
    fn named_keys_win_over_the_fallback() {
        let n = ShapeNormalizer::default();
        let body = json!({"items": [{"id": "late"}], "results": [{"id": "named"}]});
        assert_eq!(n.extract(&body), vec![json!({"id": "named"})]);
    }

    #[test]
    fn fallback_skips_empty_arrays() {
        let n = ShapeNormalizer::default();
        let body = json!({"tags": [], "items": [{"id": "a"}]});
        assert_eq!(n.extract(&body), vec![json!({"id": "a"})]);
        assert_eq!(n.describe(&body).matched.as_deref(), Some(".items"));
    }

    #[test]
    fn fallback_scans_in_document_order() {
        let n = ShapeNormalizer::default();
        let body = json!({"meta": {"x": 1}, "items": [{"id": "a"}], "other": [{"id": "b"}]});
        let records = n.extract(&body);
        assert_eq!(records, vec![json!({"id": "a"})]);
    }

    #[test]
    fn empty_named_array_falls_through() {
        let n = ShapeNormalizer::default();
        let body = json!({"data": [], "items": [{"id": 1}]});
        assert_eq!(n.extract(&body), vec![json!({"id": 1})]);
    }

    #[test]
    fn no_array_yields_empty() {
        let n = ShapeNormalizer::default();
        assert!(n.extract(&json!({"data": []})).is_empty());
        assert!(n.extract(&json!({"message": "ok"})).is_empty());
        assert!(n.extract(&json!("plain")).is_empty());
    }

    #[test]
    fn cursor_extraction() {
        assert_eq!(next_cursor(&json!({"next_starting_after": "abc"})).as_deref(), Some("abc"));
        assert_eq!(next_cursor(&json!({"next_starting_after": ""})), None);
        assert_eq!(next_cursor(&json!({"next_starting_after": null})), None);
        assert_eq!(next_cursor(&json!([1, 2])), None);
    }

    #[test]
    fn describe_summarises_body() {
        let n = ShapeNormalizer::default();
        let summary = n.describe(&json!({"items": [{"id": "x"}], "next_starting_after": "x"}));
        assert_eq!(summary.kind, "object");
        assert!(!summary.is_array);
        assert_eq!(summary.keys, vec!["items", "next_starting_after"]);
        assert_eq!(summary.matched.as_deref(), Some(".items"));
        assert_eq!(summary.record_count, 1);
        assert_eq!(summary.next_cursor.as_deref(), Some("x"));
        assert!(summary.sample.unwrap().contains("\"x\""));
    }

    #[test]
    fn sample_is_truncated() {
        let long = "y".repeat(2 * SAMPLE_LIMIT);
        let summary = ShapeNormalizer::default().describe(&json!([{ "v": long }]));
        let sample = summary.sample.unwrap();
        assert!(sample.ends_with("..."));
        assert_eq!(sample.chars().count(), SAMPLE_LIMIT + 3);
    }
}

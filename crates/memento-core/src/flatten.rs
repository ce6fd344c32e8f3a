//! Property flattening for the graph store (spec §9).
//!
//! The graph store is assumed to accept only scalar property types. Dates are
//! serialized as ISO 8601 strings; arrays and nested objects are serialized as
//! JSON strings. Readers reverse the transformation on a known set of fields
//! (`metadata`, `dependencies`, `size`, `lines`, `version`, `lastModified`,
//! `created`).

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

/// Fields whose JSON-string encoding is reversed by [`unflatten_known_fields`].
pub const KNOWN_JSON_FIELDS: &[&str] = &[
    "metadata",
    "dependencies",
    "size",
    "lines",
    "version",
    "lastModified",
    "created",
];

/// Format a timestamp the way the graph store expects it (ISO 8601 / RFC 3339).
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Parse a timestamp previously produced by [`format_timestamp`].
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Flatten one JSON value into a graph-store-safe scalar: objects and arrays
/// become JSON-encoded strings, scalars pass through unchanged.
#[must_use]
pub fn flatten_value(value: &Value) -> Value {
    match value {
        Value::Object(_) | Value::Array(_) => {
            Value::String(serde_json::to_string(value).unwrap_or_default())
        }
        scalar => scalar.clone(),
    }
}

/// Flatten an entire property map in place, suitable for a `SET n += $props`
/// style bulk write.
#[must_use]
pub fn flatten_properties(props: &HashMap<String, Value>) -> HashMap<String, Value> {
    props
        .iter()
        .map(|(k, v)| (k.clone(), flatten_value(v)))
        .collect()
}

/// Reverse the flattening for the known fields listed in
/// [`KNOWN_JSON_FIELDS`]: any of those that hold a JSON-encoded string are
/// parsed back into their structured form. Unknown fields and fields that
/// fail to parse are left untouched.
pub fn unflatten_known_fields(props: &mut HashMap<String, Value>) {
    for field in KNOWN_JSON_FIELDS {
        if let Some(Value::String(raw)) = props.get(*field) {
            if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
                props.insert((*field).to_string(), parsed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn scalars_pass_through_unchanged() {
        assert_eq!(flatten_value(&json!(42)), json!(42));
        assert_eq!(flatten_value(&json!("hello")), json!("hello"));
        assert_eq!(flatten_value(&json!(true)), json!(true));
        assert_eq!(flatten_value(&Value::Null), Value::Null);
    }

    #[test]
    fn objects_and_arrays_become_json_strings() {
        let flat = flatten_value(&json!({"a": 1}));
        assert_eq!(flat, Value::String(r#"{"a":1}"#.to_string()));

        let flat_arr = flatten_value(&json!([1, 2, 3]));
        assert_eq!(flat_arr, Value::String("[1,2,3]".to_string()));
    }

    #[test]
    fn timestamp_round_trips() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        let s = format_timestamp(ts);
        assert_eq!(parse_timestamp(&s), Some(ts));
    }

    #[test]
    fn unflatten_reverses_metadata_and_dependencies() {
        let mut props = HashMap::new();
        props.insert("metadata".to_string(), json!(r#"{"owner":"alice"}"#));
        props.insert(
            "dependencies".to_string(),
            json!(r#"["left-pad","react"]"#),
        );
        props.insert("path".to_string(), json!("src/a.ts"));

        unflatten_known_fields(&mut props);

        assert_eq!(props["metadata"], json!({"owner": "alice"}));
        assert_eq!(props["dependencies"], json!(["left-pad", "react"]));
        assert_eq!(props["path"], json!("src/a.ts"));
    }

    #[test]
    fn unflatten_ignores_non_json_strings() {
        let mut props = HashMap::new();
        props.insert("lastModified".to_string(), json!("not json"));
        unflatten_known_fields(&mut props);
        assert_eq!(props["lastModified"], json!("not json"));
    }

    #[test]
    fn flatten_properties_handles_mixed_map() {
        let mut props = HashMap::new();
        props.insert("path".to_string(), json!("src/a.ts"));
        props.insert("metadata".to_string(), json!({"k": "v"}));
        let flat = flatten_properties(&props);
        assert_eq!(flat["path"], json!("src/a.ts"));
        assert_eq!(flat["metadata"], Value::String(r#"{"k":"v"}"#.to_string()));
    }
}

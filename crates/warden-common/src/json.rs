//! JSON Payload Shaping Utilities
//!
//! Audit records carry caller-supplied JSON payloads of unbounded shape.
//! These helpers bound what gets persisted without failing the caller.

use serde_json::Value;

/// Replace every object or array nested deeper than `max_depth` with a
/// string placeholder, leaving scalars untouched.
///
/// A `max_depth` of 0 collapses any container into the placeholder; each
/// level of nesting consumes one unit of depth.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use warden_common::json::truncate_depth;
///
/// let value = json!({ "a": { "b": { "c": 1 } } });
/// let capped = truncate_depth(value, 2, "<truncated>");
/// assert_eq!(capped, json!({ "a": { "b": "<truncated>" } }));
/// ```
pub fn truncate_depth(value: Value, max_depth: usize, placeholder: &str) -> Value {
    match value {
        Value::Object(_) | Value::Array(_) if max_depth == 0 => {
            Value::String(placeholder.to_string())
        },
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, inner)| (key, truncate_depth(inner, max_depth - 1, placeholder)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|inner| truncate_depth(inner, max_depth - 1, placeholder))
                .collect(),
        ),
        scalar => scalar,
    }
}

/// Depth of a JSON value: scalars are 0, containers are one more than
/// their deepest element. An empty container has depth 1.
pub fn value_depth(value: &Value) -> usize {
    match value {
        Value::Object(map) => 1 + map.values().map(value_depth).max().unwrap_or(0),
        Value::Array(items) => 1 + items.iter().map(value_depth).max().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested(levels: usize) -> Value {
        let mut value = json!(42);
        for _ in 0..levels {
            value = json!({ "next": value });
        }
        value
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(truncate_depth(json!(7), 0, "<cut>"), json!(7));
        assert_eq!(truncate_depth(json!("s"), 0, "<cut>"), json!("s"));
        assert_eq!(truncate_depth(Value::Null, 0, "<cut>"), Value::Null);
    }

    #[test]
    fn test_container_at_limit_is_replaced() {
        let capped = truncate_depth(nested(3), 2, "<cut>");
        assert_eq!(capped, json!({ "next": { "next": "<cut>" } }));
    }

    #[test]
    fn test_shallow_values_unchanged() {
        let value = json!({ "a": [1, 2, { "b": true }] });
        assert_eq!(truncate_depth(value.clone(), 10, "<cut>"), value);
    }

    #[test]
    fn test_arrays_are_capped() {
        let value = json!([[[1]]]);
        assert_eq!(truncate_depth(value, 2, "<cut>"), json!([["<cut>"]]));
    }

    #[test]
    fn test_value_depth() {
        assert_eq!(value_depth(&json!(1)), 0);
        assert_eq!(value_depth(&json!({})), 1);
        assert_eq!(value_depth(&nested(5)), 5);
        assert_eq!(value_depth(&json!({ "a": [1] })), 2);
    }

    #[test]
    fn test_truncated_value_fits_depth_budget() {
        let capped = truncate_depth(nested(14), 10, "<cut>");
        assert_eq!(value_depth(&capped), 10);
    }
}

//! Parsed JSON value model.
//!
//! The crate uses [`serde_json::Value`] built with `preserve_order` (object
//! keys iterate in document order) and `arbitrary_precision` (numbers keep
//! their textual representation), so a value can be rendered back exactly as
//! the server sent it.

pub use serde_json::{Map, Number, Value};

/// Runtime type name of a value as reported in diagnostics.
#[must_use]
pub fn runtime_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Compact JSON rendering of a value (`"data"`, `42`, `{"a":1}`).
#[must_use]
pub fn render(value: &Value) -> String {
    value.to_string()
}

/// Parses bytes into a [`Value`] without any shape constraints.
///
/// # Errors
/// Returns the parser error when `bytes` is not a single well-formed JSON
/// document.
pub fn parse(bytes: &[u8]) -> Result<Value, serde_json::Error> {
    serde_json::from_slice(bytes)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_type_names() {
        let value = parse(br#"[null, true, 1, "s", [], {}]"#).unwrap();
        let names: Vec<_> = value
            .as_array()
            .unwrap()
            .iter()
            .map(runtime_type)
            .collect();
        assert_eq!(
            names,
            ["null", "boolean", "number", "string", "array", "object"]
        );
    }

    #[test]
    fn test_numbers_keep_their_text() {
        let value = parse(br#"{"price": 1.10, "big": 123456789012345678901234567890}"#).unwrap();
        assert_eq!(
            render(&value),
            r#"{"price":1.10,"big":123456789012345678901234567890}"#
        );
    }

    #[test]
    fn test_objects_keep_document_order() {
        let value = parse(br#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn test_parse_rejects_trailing_garbage() {
        assert!(parse(br#"{"a": 1} x"#).is_err());
    }
}

//! Strict decoding of JSON bytes into typed targets.

use serde::de::DeserializeOwned;

use crate::error::{DecodeError, DecodeFailure};
use crate::registry::{JsonShape, shape_of};
use crate::value::{self, Value};
use crate::walk::{find_unknown_fields, first_unknown_key};

/// What to do with keys the target type does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownFields {
    /// Fail the decode and report every unknown key.
    #[default]
    Deny,
    /// Drop unknown keys silently.
    Ignore,
}

/// Rejection carrying the parsed document when the cause was an unknown key,
/// so the diagnostic pass does not parse the bytes again.
struct Rejected {
    error: DecodeError,
    document: Option<Value>,
}

impl From<DecodeError> for Rejected {
    fn from(error: DecodeError) -> Self {
        Self {
            error,
            document: None,
        }
    }
}

fn decode_inner<T>(bytes: &[u8], unknown_fields: UnknownFields) -> Result<T, Rejected>
where
    T: DeserializeOwned + JsonShape,
{
    if unknown_fields == UnknownFields::Ignore {
        return Ok(serde_json::from_slice(bytes).map_err(DecodeError::classify)?);
    }
    let document = value::parse(bytes).map_err(DecodeError::classify)?;
    let decoded = T::deserialize(&document);
    // A type error stands on its own. A missing field usually means the key
    // arrived under another name, so unknown keys are reported instead.
    let check_keys = match &decoded {
        Ok(_) => true,
        Err(err) => is_missing_field(err),
    };
    if check_keys && let Some(path) = first_unknown_key(&shape_of::<T>(), &document) {
        return Err(Rejected {
            error: DecodeError::UnknownField { path },
            document: Some(document),
        });
    }
    Ok(decoded.map_err(DecodeError::classify)?)
}

fn is_missing_field(err: &serde_json::Error) -> bool {
    err.is_data() && err.to_string().starts_with("missing field")
}

/// Decodes `bytes` into a new `T`.
///
/// With [`UnknownFields::Deny`] any key `T` does not declare fails the
/// decode with [`DecodeError::UnknownField`]. A value of the wrong type is
/// reported as [`DecodeError::TypeMismatch`] even when unknown keys are
/// also present.
///
/// # Errors
/// Returns [`DecodeError::Syntax`] for malformed JSON,
/// [`DecodeError::TypeMismatch`] when values do not fit `T`, and
/// [`DecodeError::UnknownField`] as described above.
pub fn decode<T>(bytes: &[u8], unknown_fields: UnknownFields) -> Result<T, DecodeError>
where
    T: DeserializeOwned + JsonShape,
{
    decode_inner(bytes, unknown_fields).map_err(|rejected| rejected.error)
}

/// Decodes `bytes` into an existing target.
///
/// `target` is only overwritten when decoding succeeds.
///
/// # Errors
/// Same as [`decode`].
pub fn decode_into<T>(
    bytes: &[u8],
    target: &mut T,
    unknown_fields: UnknownFields,
) -> Result<(), DecodeError>
where
    T: DeserializeOwned + JsonShape,
{
    *target = decode(bytes, unknown_fields)?;
    Ok(())
}

/// Decodes `bytes` into `T`, listing every unknown key on failure.
///
/// The diagnostic pass only runs when the decode failed because of an
/// unknown key; syntax and type errors come back without diagnostics.
///
/// # Errors
/// Returns the [`DecodeFailure`] with the decode error and, for unknown
/// keys, one [`crate::UnknownField`] per offending key.
pub fn decode_strict<T>(bytes: &[u8], unknown_fields: UnknownFields) -> Result<T, DecodeFailure>
where
    T: DeserializeOwned + JsonShape,
{
    decode_inner(bytes, unknown_fields).map_err(|rejected| {
        let unknown = rejected
            .document
            .map(|document| find_unknown_fields(&shape_of::<T>(), &document, ""))
            .unwrap_or_default();
        DecodeFailure::new(rejected.error, unknown)
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::shape::{Field, Shape, StructShape};
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Reply {
        #[serde(default)]
        different: String,
    }

    impl JsonShape for Reply {
        fn describe() -> Shape {
            Shape::structure(
                "Reply",
                StructShape::new().field(Field::new("different", shape_of::<String>)),
            )
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Order {
        id: u64,
        lines: Vec<Line>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Line {
        sku: String,
        qty: u32,
    }

    impl JsonShape for Order {
        fn describe() -> Shape {
            Shape::structure(
                "Order",
                StructShape::new()
                    .field(Field::new("id", shape_of::<u64>))
                    .field(Field::new("lines", shape_of::<Vec<Line>>)),
            )
        }
    }

    impl JsonShape for Line {
        fn describe() -> Shape {
            Shape::structure(
                "Line",
                StructShape::new()
                    .field(Field::new("sku", shape_of::<String>))
                    .field(Field::new("qty", shape_of::<u32>)),
            )
        }
    }

    #[test]
    fn test_strict_rejects_unknown_root_key() {
        let failure =
            decode_strict::<Reply>(br#"{"output":"data"}"#, UnknownFields::Deny).unwrap_err();
        assert!(failure.error().is_unknown_field());
        let [diagnostic] = failure.unknown_fields() else {
            panic!("expected one diagnostic, got {:?}", failure.unknown_fields());
        };
        assert_eq!(diagnostic.path(), "output");
        assert_eq!(diagnostic.runtime_type(), "string");
        assert_eq!(diagnostic.runtime_value(), r#""data""#);
        assert_eq!(
            failure.to_string(),
            "json: unknown field \"output\"\nunknown field output of type string with value \"data\""
        );
    }

    #[test]
    fn test_lenient_ignores_unknown_keys() {
        let reply: Reply = decode(br#"{"output":"data"}"#, UnknownFields::Ignore).unwrap();
        assert_eq!(reply, Reply::default());
    }

    #[test]
    fn test_strict_accepts_conforming_payload() {
        let order: Order = decode(
            br#"{"id": 7, "lines": [{"sku": "a", "qty": 2}]}"#,
            UnknownFields::Deny,
        )
        .unwrap();
        assert_eq!(order.id, 7);
        assert_eq!(
            order.lines,
            [Line {
                sku: "a".to_owned(),
                qty: 2
            }]
        );
    }

    #[test]
    fn test_unknown_key_error_names_first_path() {
        let err = decode::<Order>(
            br#"{"id": 7, "lines": [{"sku": "a", "qty": 2, "note": "x"}], "extra": 1}"#,
            UnknownFields::Deny,
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::UnknownField { ref path } if path == "lines[0].note"));
    }

    #[test]
    fn test_every_unknown_key_is_listed() {
        let failure = decode_strict::<Order>(
            br#"{"id": 7, "lines": [{"sku": "a", "qty": 2, "note": "x"}], "extra": 1}"#,
            UnknownFields::Deny,
        )
        .unwrap_err();
        let paths: Vec<_> = failure
            .unknown_fields()
            .iter()
            .map(crate::UnknownField::path)
            .collect();
        assert_eq!(paths, ["lines[0].note", "extra"]);
    }

    #[test]
    fn test_syntax_error_has_no_diagnostics() {
        for mode in [UnknownFields::Deny, UnknownFields::Ignore] {
            let failure = decode_strict::<Order>(br#"{"id": 7,"#, mode).unwrap_err();
            assert!(failure.error().is_syntax());
            assert!(failure.unknown_fields().is_empty());
        }
    }

    #[test]
    fn test_type_mismatch_has_no_diagnostics() {
        for mode in [UnknownFields::Deny, UnknownFields::Ignore] {
            let failure =
                decode_strict::<Order>(br#"{"id": "seven", "lines": []}"#, mode).unwrap_err();
            assert!(failure.error().is_type_mismatch());
            assert!(failure.unknown_fields().is_empty());
        }
    }

    #[test]
    fn test_type_mismatch_wins_over_later_unknown_key() {
        let failure = decode_strict::<Order>(br#"{"id":"seven","extra":1}"#, UnknownFields::Deny)
            .unwrap_err();
        assert!(failure.error().is_type_mismatch());
        assert!(failure.unknown_fields().is_empty());
    }

    #[test]
    fn test_missing_field_defers_to_unknown_key() {
        let failure =
            decode_strict::<Order>(br#"{"id":7,"line":[]}"#, UnknownFields::Deny).unwrap_err();
        assert!(
            matches!(failure.error(), DecodeError::UnknownField { path } if path == "line")
        );
        assert_eq!(failure.unknown_fields().len(), 1);

        let err = decode::<Order>(br#"{"id":7}"#, UnknownFields::Deny).unwrap_err();
        assert!(err.is_type_mismatch());
    }

    #[test]
    fn test_lenient_never_fails_on_unknown_keys() {
        let order: Order = decode(
            br#"{"id": 1, "lines": [{"sku": "b", "qty": 1, "x": {}}], "y": [1, 2]}"#,
            UnknownFields::Ignore,
        )
        .unwrap();
        assert_eq!(order.lines.len(), 1);
    }

    #[test]
    fn test_decode_into_keeps_target_on_failure() {
        let mut reply = Reply {
            different: "kept".to_owned(),
        };
        assert!(decode_into(br#"{"output":"data"}"#, &mut reply, UnknownFields::Deny).is_err());
        assert_eq!(reply.different, "kept");
        decode_into(br#"{"different":"new"}"#, &mut reply, UnknownFields::Deny).unwrap();
        assert_eq!(reply.different, "new");
    }

    #[test]
    fn test_numbers_keep_precision_in_values() {
        let value: Value = decode(br#"{"amount": 10.50}"#, UnknownFields::Deny).unwrap();
        assert_eq!(value.to_string(), r#"{"amount":10.50}"#);
    }
}

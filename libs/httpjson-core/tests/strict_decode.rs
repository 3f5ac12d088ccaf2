#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;

use bytes::Bytes;
use http::StatusCode;
use httpjson_core::{
    JsonShape, UnknownFields, decode, decode_response, decode_strict, find_unknown_fields,
    shape_of, value,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize, JsonShape)]
struct Reply {
    #[serde(default)]
    different: String,
}

#[derive(Debug, Deserialize, JsonShape)]
#[allow(non_snake_case)]
struct Outer {
    Known: i64,
    Nested: Option<Box<Inner>>,
    Items: Vec<Inner>,
    Extras: BTreeMap<String, Inner>,
}

#[derive(Debug, Deserialize, JsonShape)]
#[allow(non_snake_case)]
struct Inner {
    Known: i64,
    #[serde(default)]
    Field: String,
}

#[test]
fn test_strict_decode_reports_unknown_output() {
    let failure =
        decode_strict::<Reply>(br#"{"output":"data"}"#, UnknownFields::Deny).unwrap_err();
    let [diagnostic] = failure.unknown_fields() else {
        panic!("expected exactly one diagnostic");
    };
    assert_eq!(diagnostic.path(), "output");
    assert_eq!(diagnostic.runtime_type(), "string");
    assert_eq!(diagnostic.runtime_value(), "\"data\"");
    assert_eq!(
        diagnostic.describe(),
        "unknown field output of type string with value \"data\""
    );
}

#[test]
fn test_lenient_decode_accepts_unknown_output() {
    let reply: Reply = decode(br#"{"output":"data"}"#, UnknownFields::Ignore).unwrap();
    assert_eq!(reply.different, "");
}

#[test]
fn test_nested_sequence_and_map_paths() {
    let body = br#"{
        "Known": 1,
        "Nested": {"Known": 1, "Extra": 2},
        "Items": [{"Known": 1, "Extra": 2}, {"Known": 3}],
        "Extras": {"any-key": {"Known": 4, "Field": "f", "Deep": {"x": 1}}}
    }"#;
    let failure = decode_strict::<Outer>(body, UnknownFields::Deny).unwrap_err();
    let paths: Vec<_> = failure
        .unknown_fields()
        .iter()
        .map(|diagnostic| diagnostic.path())
        .collect();
    assert_eq!(paths, ["Nested.Extra", "Items[0].Extra", "Extras.any-key.Deep"]);
}

#[test]
fn test_root_sequence_paths() {
    let body = br#"[{"Known": 1, "Extra": 2}]"#;
    let failure = decode_strict::<Vec<Inner>>(body, UnknownFields::Deny).unwrap_err();
    assert_eq!(failure.unknown_fields()[0].path(), "[0].Extra");
}

#[test]
fn test_walker_matches_decoder_findings() {
    let body = br#"{"Known": 1, "Items": [], "Extras": {}, "Nested": null, "More": [1]}"#;
    let document = value::parse(body).unwrap();
    let walked = find_unknown_fields(&shape_of::<Outer>(), &document, "");
    let failure = decode_strict::<Outer>(body, UnknownFields::Deny).unwrap_err();
    assert_eq!(walked, failure.unknown_fields());
}

#[test]
fn test_response_with_error_status_and_unknown_fields() {
    let err = decode_response::<Reply>(
        StatusCode::BAD_REQUEST,
        Bytes::from_static(br#"{"error":"bad input"}"#),
        UnknownFields::Deny,
    )
    .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    assert_eq!(
        err.unknown_fields().map(|d| d.describe()).collect::<Vec<_>>(),
        ["unknown field error of type string with value \"bad input\""]
    );
    assert_eq!(err.body().as_ref(), br#"{"error":"bad input"}"#);
}

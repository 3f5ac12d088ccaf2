#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Strict JSON decoding with unknown-field diagnostics.
//!
//! Decodes JSON into serde targets with zero tolerance for keys the target
//! does not declare. When a payload is rejected for carrying such keys, the
//! parsed document is walked against the target's [`Shape`] and every
//! offending key is reported with its full path, runtime type and value:
//!
//! ```text
//! json: unknown field "output"
//! unknown field output of type string with value "data"
//! ```
//!
//! # Shapes
//!
//! A target describes itself through [`JsonShape`], normally derived:
//!
//! ```ignore
//! use httpjson_core::{JsonShape, UnknownFields, decode_strict};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, JsonShape)]
//! struct Reply {
//!     #[serde(rename = "different")]
//!     value: String,
//! }
//!
//! let failure = decode_strict::<Reply>(br#"{"output":"data"}"#, UnknownFields::Deny)
//!     .unwrap_err();
//! assert_eq!(failure.unknown_fields()[0].path(), "output");
//! ```
//!
//! The derive reads the `#[serde(...)]` attributes that change which keys a
//! struct accepts (`rename`, `rename_all`, `alias`, `skip`, `flatten`,
//! `transparent`). Shapes are built once per type and cached for the life of
//! the process.
//!
//! # Responses
//!
//! [`decode_response`] and [`decode_response_or`] combine the decode outcome
//! with the HTTP status into a single [`JsonError`] that keeps the raw body.

extern crate self as httpjson_core;

mod aggregate;
mod decode;
mod diagnostic;
mod error;
mod registry;
pub mod shape;
pub mod value;
mod walk;

pub use aggregate::{Either, decode_response, decode_response_or};
pub use decode::{UnknownFields, decode, decode_into, decode_strict};
pub use diagnostic::UnknownField;
pub use error::{Attempt, DecodeError, DecodeFailure, JsonError, StatusError};
pub use httpjson_macros::JsonShape;
pub use registry::{JsonShape, shape_of};
pub use shape::{Field, Shape, ShapeKind, ShapeRef, StructShape};
pub use walk::find_unknown_fields;

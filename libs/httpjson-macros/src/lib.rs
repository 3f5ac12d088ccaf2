//! # httpjson-macros
//!
//! Derive macro describing the JSON shape of a serde decode target.
//!
//! `#[derive(JsonShape)]` generates an `httpjson_core::JsonShape` impl from
//! the same `#[serde(...)]` attributes the `Deserialize` derive reads, so the
//! strict decoder knows exactly which keys a struct accepts.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use proc_macro::TokenStream;
use proc_macro_error2::proc_macro_error;
use syn::{DeriveInput, parse_macro_input};

mod json_shape;
mod rename;

/// Derive macro for implementing `JsonShape`.
///
/// # Recognized `serde` attributes
///
/// Container:
/// - `rename_all = "..."` / `rename_all(deserialize = "...")`
/// - `transparent`
/// - `from = "..."` / `try_from = "..."` (keys are those of the source type,
///   which must implement `JsonShape`)
///
/// Field:
/// - `rename = "..."` / `rename(deserialize = "...")`
/// - `alias = "..."`
/// - `skip` / `skip_deserializing` (the field accepts no key)
/// - `flatten`
/// - `with = "..."` / `deserialize_with = "..."` (the value is not inspected)
///
/// Everything else serde understands is ignored.
///
/// # `json_shape` attributes
///
/// - container `crate = "path"`: path to `httpjson_core` when it is
///   re-exported (defaults to `::httpjson_core`)
/// - container `label = "..."`: label used in diagnostics (defaults to the
///   type name)
/// - field `opaque`: accept any value without inspecting it
///
/// Enums and unit structs are described as opaque scalars. Newtype structs
/// are transparent, and tuple structs are arrays checked by position.
///
/// # Example
///
/// ```ignore
/// use httpjson_core::JsonShape;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonShape)]
/// #[serde(rename_all = "camelCase")]
/// pub struct User {
///     pub user_id: u64,
///     #[serde(alias = "mail")]
///     pub email: String,
///     #[serde(skip)]
///     pub cached: bool,
/// }
/// ```
#[proc_macro_derive(JsonShape, attributes(json_shape, serde))]
#[proc_macro_error]
pub fn derive_json_shape(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    json_shape::expand_derive_json_shape(input).into()
}

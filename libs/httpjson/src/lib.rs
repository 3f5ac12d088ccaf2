#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! JSON REST HTTP client
//!
//! A hyper-based client that speaks JSON with good defaults:
//! - TLS via rustls with webpki roots (HTTPS only by default)
//! - `Accept-Encoding: gzip, br, zstd` on every request, with transparent
//!   response decompression and a body size limit on decoded bytes
//! - optional gzip, brotli or zstd compression of JSON request bodies
//! - strict response decoding: unknown keys are rejected and reported with
//!   their path, runtime type and value
//! - structured request logging and exchange capture layers
//!
//! # Example
//!
//! ```ignore
//! use httpjson::{HeaderPatch, HttpClient, HttpError, JsonShape};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, JsonShape)]
//! struct Status {
//!     message: String,
//! }
//!
//! let client = HttpClient::builder().build()?;
//! match client
//!     .get_json::<Status>("https://api.example.com/status", &HeaderPatch::new())
//!     .await
//! {
//!     Ok(status) => println!("{}", status.message),
//!     Err(HttpError::Json(err)) => {
//!         // e.g. "unknown field output of type string with value \"data\""
//!         for diagnostic in err.unknown_fields() {
//!             eprintln!("{diagnostic}");
//!         }
//!     }
//!     Err(err) => return Err(err.into()),
//! }
//! ```

mod builder;
mod client;
mod compress;
mod config;
mod error;
mod headers;
mod layers;
mod request;
mod response;
mod tls;

pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use compress::compress;
pub use config::{
    Compression, DEFAULT_MAX_BODY_SIZE, DEFAULT_USER_AGENT, HttpClientConfig, TransportSecurity,
};
pub use error::{HttpError, InvalidUriKind};
pub use headers::HeaderPatch;
pub use layers::{CaptureLayer, CaptureService, CapturedResponse, LogLayer, LogService, Record};
pub use request::{ACCEPT_ENCODING_VALUE, JSON_CONTENT_TYPE, RequestBuilder};
pub use response::{HttpResponse, LimitedBody, ResponseBody};

// Derives in crates that only depend on `httpjson` point at this path with
// `#[json_shape(crate = "httpjson::httpjson_core")]`.
pub use httpjson_core;
pub use httpjson_core::{
    DecodeError, DecodeFailure, Either, JsonError, JsonShape, StatusError, UnknownField,
    UnknownFields,
};

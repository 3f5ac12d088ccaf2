use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use httpjson_core::UnknownFields;

use crate::error::HttpError;
use crate::headers::HeaderPatch;

/// Default User-Agent string for HTTP requests
pub const DEFAULT_USER_AGENT: &str = concat!("httpjson/", env!("CARGO_PKG_VERSION"));

/// Default maximum response body size (10 MiB), applied to decompressed bytes
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Transport security mode
///
/// Controls which URL schemes a client accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportSecurity {
    /// Only `https://` URLs are accepted (default)
    #[default]
    TlsOnly,
    /// Both `http://` and `https://` URLs are accepted
    ///
    /// Intended for tests against local mock servers.
    AllowInsecureHttp,
}

/// Encoding applied to request bodies set with
/// [`RequestBuilder::json`](crate::RequestBuilder::json).
///
/// Most servers do not accept compressed request bodies; leave this at
/// [`Compression::None`] unless the peer is known to support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Brotli,
    Zstd,
}

impl Compression {
    /// Token used in the `Content-Encoding` header, `None` when uncompressed.
    #[must_use]
    pub fn content_encoding(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Gzip => Some("gzip"),
            Self::Brotli => Some("br"),
            Self::Zstd => Some("zstd"),
        }
    }
}

impl FromStr for Compression {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Self::None),
            "gzip" => Ok(Self::Gzip),
            "br" => Ok(Self::Brotli),
            "zstd" => Ok(Self::Zstd),
            other => Err(HttpError::InvalidCompression(other.to_owned())),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.content_encoding().unwrap_or(""))
    }
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Per-request timeout (default: 30 seconds)
    pub request_timeout: Duration,

    /// Maximum response body size in bytes after decompression (default: 10 MiB)
    pub max_body_size: usize,

    /// User-Agent header value (default: `httpjson/<version>`)
    pub user_agent: String,

    /// Transport security mode (default: `TlsOnly`)
    pub transport: TransportSecurity,

    /// Header directives applied to every request after the built-in headers
    pub default_headers: HeaderPatch,

    /// Request body compression for JSON bodies (default: none)
    pub post_compression: Compression,

    /// Unknown-field policy for decoded responses (default: `Deny`)
    pub unknown_fields: UnknownFields,

    /// Level at which requests are logged; `None` disables the log layer
    pub log_level: Option<tracing::Level>,

    /// Buffer capacity for concurrent request handling (default: 1024)
    ///
    /// A capacity of 0 is clamped to 1.
    pub buffer_capacity: usize,

    /// Idle timeout for pooled connections (default: 90 seconds)
    ///
    /// `None` keeps idle connections indefinitely.
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum idle connections kept per host (default: 32)
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            transport: TransportSecurity::TlsOnly,
            default_headers: HeaderPatch::new(),
            post_compression: Compression::None,
            unknown_fields: UnknownFields::Deny,
            log_level: None,
            buffer_capacity: 1024,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

impl HttpClientConfig {
    /// Configuration with a short timeout and a small body limit
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_body_size: 1024 * 1024,
            ..Default::default()
        }
    }

    /// Configuration for tests against local mock servers
    ///
    /// Allows plain HTTP and logs every request at `DEBUG`.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            transport: TransportSecurity::AllowInsecureHttp,
            log_level: Some(tracing::Level::DEBUG),
            ..Default::default()
        }
    }
}

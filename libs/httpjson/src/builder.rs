use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::Response;
use http::header::HeaderValue;
use http_body_util::{BodyExt, Full};
use httpjson_core::UnknownFields;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tokio::sync::mpsc::UnboundedSender;
use tower::buffer::Buffer;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneService;
use tower::{Layer, ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;

use crate::client::{BufferedService, ClientSettings};
use crate::config::{Compression, HttpClientConfig, TransportSecurity};
use crate::error::HttpError;
use crate::headers::HeaderPatch;
use crate::layers::{CaptureLayer, LogLayer, Record};
use crate::response::ResponseBody;
use crate::tls;

/// Type-erased service between layer composition steps in [`HttpClientBuilder::build`].
type InnerService =
    BoxCloneService<http::Request<Full<Bytes>>, http::Response<ResponseBody>, HttpError>;

/// Builder for constructing an [`HttpClient`](crate::HttpClient) with a
/// layered tower middleware stack.
pub struct HttpClientBuilder {
    config: HttpClientConfig,
    capture: Option<UnboundedSender<Record>>,
}

impl HttpClientBuilder {
    /// Create a new builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a builder with a specific configuration
    #[must_use]
    pub fn with_config(config: HttpClientConfig) -> Self {
        Self {
            config,
            capture: None,
        }
    }

    /// Set the per-request timeout
    ///
    /// Covers connecting, sending the request and receiving the response
    /// headers. Reading the body is not bounded by it.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the user agent string
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the maximum response body size, applied after decompression
    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Set transport security mode
    ///
    /// Use `TransportSecurity::AllowInsecureHttp` only for testing with mock servers.
    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.transport = transport;
        self
    }

    /// Allow insecure HTTP connections (for testing only)
    ///
    /// Equivalent to `.transport(TransportSecurity::AllowInsecureHttp)`.
    ///
    /// Only available in debug builds or with the `allow-insecure-http`
    /// feature.
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn allow_insecure_http(mut self) -> Self {
        tracing::warn!(
            target: "httpjson::security",
            "allow_insecure_http() called - HTTP traffic will NOT be encrypted"
        );
        self.config.transport = TransportSecurity::AllowInsecureHttp;
        self
    }

    /// Set the header directives applied to every request
    #[must_use]
    pub fn default_headers(mut self, headers: HeaderPatch) -> Self {
        self.config.default_headers = headers;
        self
    }

    /// Set the compression applied to JSON request bodies
    #[must_use]
    pub fn post_compression(mut self, compression: Compression) -> Self {
        self.config.post_compression = compression;
        self
    }

    /// Set the unknown-field policy for decoded responses
    #[must_use]
    pub fn unknown_fields(mut self, unknown_fields: UnknownFields) -> Self {
        self.config.unknown_fields = unknown_fields;
        self
    }

    /// Log every request and response at `level`
    ///
    /// Failures are always logged at `ERROR`.
    #[must_use]
    pub fn log_level(mut self, level: tracing::Level) -> Self {
        self.config.log_level = Some(level);
        self
    }

    /// Send a [`Record`] of every exchange to `sender`
    ///
    /// A record is sent once the response body is released, or as soon as
    /// the request fails.
    #[must_use]
    pub fn capture(mut self, sender: UnboundedSender<Record>) -> Self {
        self.capture = Some(sender);
        self
    }

    /// Set the buffer capacity for concurrent request handling
    ///
    /// A capacity of 0 is clamped to 1.
    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        // tower::Buffer panics with capacity=0
        self.config.buffer_capacity = capacity.max(1);
        self
    }

    /// Set the idle connection timeout for the connection pool
    ///
    /// Set to `None` to keep idle connections indefinitely.
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Set the maximum number of idle connections per host
    #[must_use]
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Build the HTTP client with all configured layers
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails or the user agent is not
    /// a valid header value
    pub fn build(self) -> Result<crate::HttpClient, HttpError> {
        if self.config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                "insecure HTTP enabled (TransportSecurity::AllowInsecureHttp); \
                 use only for testing with mock servers"
            );
        }

        let timeout = self.config.request_timeout;
        let user_agent = HeaderValue::try_from(self.config.user_agent.as_str())?;

        let https = tls::https_connector(self.config.transport)?;

        let mut client_builder = Client::builder(TokioExecutor::new());

        // pool_timer is required for pool_idle_timeout to take effect
        client_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(self.config.pool_max_idle_per_host)
            .http2_only(false);

        if let Some(idle_timeout) = self.config.pool_idle_timeout {
            client_builder.pool_idle_timeout(idle_timeout);
        }

        let hyper_client = client_builder.build::<_, Full<Bytes>>(https);

        // Request flow (outer to inner):
        //   Buffer -> ErrorMapping -> Timeout -> Decompression ->
        //   [Log?] -> [Capture?] -> hyper_client
        //
        // Log and Capture sit below decompression so they see the bytes and
        // headers exactly as the server sent them.
        let mut transport: InnerService = hyper_client
            .map_response(box_response)
            .map_err(HttpError::from)
            .boxed_clone();

        if let Some(sender) = self.capture {
            transport = CaptureLayer::new(sender).layer(transport).boxed_clone();
        }

        if let Some(level) = self.config.log_level {
            transport = LogLayer::new(level).layer(transport).boxed_clone();
        }

        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .layer(DecompressionLayer::new())
            .service(transport);

        let service = service
            .map_response(box_response)
            .map_err(move |e: tower::BoxError| map_tower_error(e, timeout));

        let buffer_capacity = self.config.buffer_capacity.max(1);
        let service: BufferedService = Buffer::new(service.boxed_clone(), buffer_capacity);

        let settings = ClientSettings {
            max_body_size: self.config.max_body_size,
            transport_security: self.config.transport,
            user_agent,
            default_headers: self.config.default_headers,
            post_compression: self.config.post_compression,
            unknown_fields: self.config.unknown_fields,
        };

        Ok(crate::HttpClient {
            service,
            settings: Arc::new(settings),
        })
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Map tower errors to `HttpError` with actual timeout duration
///
/// Typed errors boxed by inner layers are unwrapped before falling back to
/// `Transport`.
fn map_tower_error(err: tower::BoxError, timeout: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(timeout);
    }

    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(other) => HttpError::Transport(other),
    }
}

/// Box a response body into [`ResponseBody`].
fn box_response<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: http_body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = response.into_parts();
    let boxed_body: ResponseBody = body.map_err(Into::into).boxed();
    Response::from_parts(parts, boxed_body)
}

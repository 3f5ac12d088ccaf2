use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::header::HeaderValue;
use http::{Request, Response};
use http_body_util::Full;
use httpjson_core::{JsonShape, UnknownFields};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tower::Service;
use tower::buffer::Buffer;

use crate::builder::HttpClientBuilder;
use crate::config::{Compression, TransportSecurity};
use crate::error::HttpError;
use crate::headers::HeaderPatch;
use crate::request::RequestBuilder;
use crate::response::ResponseBody;

/// Type alias for the future type of the inner service
pub type ServiceFuture =
    Pin<Box<dyn Future<Output = Result<Response<ResponseBody>, HttpError>> + Send>>;

/// Type alias for the buffered service
pub type BufferedService = Buffer<Request<Full<Bytes>>, ServiceFuture>;

/// Per-client settings every request reads when it is assembled.
#[derive(Debug)]
pub struct ClientSettings {
    pub max_body_size: usize,
    pub transport_security: TransportSecurity,
    pub user_agent: HeaderValue,
    pub default_headers: HeaderPatch,
    pub post_compression: Compression,
    pub unknown_fields: UnknownFields,
}

/// JSON REST HTTP client
///
/// Every request advertises `gzip, br, zstd`, sends
/// `application/json; charset=utf-8` and transparently decompresses the
/// response. Decoded responses reject unknown keys by default, reporting
/// each one with its path, type and value.
///
/// `HttpClient` is `Clone + Send + Sync`; clones share the connection pool
/// and the request buffer.
///
/// # Example
///
/// ```ignore
/// let client = HttpClient::builder()
///     .default_headers(HeaderPatch::new().try_set("authorization", "Bearer 123")?)
///     .build()?;
///
/// let user: User = client
///     .get_json("https://api.example.com/users/1", &HeaderPatch::new())
///     .await?;
/// ```
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) service: BufferedService,
    pub(crate) settings: Arc<ClientSettings>,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails
    pub fn new() -> Result<Self, HttpError> {
        HttpClientBuilder::new().build()
    }

    /// Create a builder for configuring the HTTP client
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    fn request(&self, method: http::Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(
            self.service.clone(),
            Arc::clone(&self.settings),
            method,
            url.to_owned(),
        )
    }

    /// Create a GET request builder
    ///
    /// The URL must be absolute. `http://` URLs additionally require
    /// [`TransportSecurity::AllowInsecureHttp`].
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::GET, url)
    }

    /// Create a POST request builder
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::POST, url)
    }

    /// Create a PUT request builder
    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::PUT, url)
    }

    /// Create a PATCH request builder
    pub fn patch(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::PATCH, url)
    }

    /// Create a DELETE request builder
    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::DELETE, url)
    }

    /// GET `url` and strictly decode the response as `T`
    ///
    /// # Errors
    /// Transport errors, or `HttpError::Json` when the body does not decode
    /// or the status is 400 or above.
    pub async fn get_json<T>(&self, url: &str, headers: &HeaderPatch) -> Result<T, HttpError>
    where
        T: DeserializeOwned + JsonShape,
    {
        self.get(url).headers(headers).send_json().await
    }

    /// POST `body` as JSON to `url` and strictly decode the response as `T`
    ///
    /// # Errors
    /// Same as [`get_json`](Self::get_json), plus body encoding errors.
    pub async fn post_json<I, T>(
        &self,
        url: &str,
        headers: &HeaderPatch,
        body: &I,
    ) -> Result<T, HttpError>
    where
        I: Serialize + ?Sized,
        T: DeserializeOwned + JsonShape,
    {
        self.post(url).headers(headers).json(body)?.send_json().await
    }
}

/// Map buffer errors to `HttpError`
///
/// Buffer returns the inner service error boxed, or a closed error if the
/// worker has shut down.
pub fn map_buffer_error(err: tower::BoxError) -> HttpError {
    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(err) => {
            tracing::error!(
                error = %err,
                "buffer worker closed unexpectedly; service unavailable"
            );
            HttpError::ServiceClosed
        }
    }
}

/// Try to acquire a buffer slot with fail-fast semantics.
///
/// If the buffer is full, returns `HttpError::Overloaded` immediately instead
/// of waiting.
pub async fn try_acquire_buffer_slot(service: &mut BufferedService) -> Result<(), HttpError> {
    use std::task::Poll;

    let poll_result = std::future::poll_fn(|cx| match service.poll_ready(cx) {
        Poll::Ready(result) => Poll::Ready(Some(result)),
        Poll::Pending => Poll::Ready(None),
    })
    .await;

    match poll_result {
        Some(Ok(())) => Ok(()),
        Some(Err(e)) => Err(map_buffer_error(e)),
        None => Err(HttpError::Overloaded),
    }
}

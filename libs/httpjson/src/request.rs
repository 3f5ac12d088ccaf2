use std::sync::Arc;

use bytes::Bytes;
use http::header::{
    ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE, HeaderName, HeaderValue, USER_AGENT,
};
use http::{HeaderMap, Request, Response};
use http_body_util::Full;
use httpjson_core::{Either, JsonShape, UnknownFields};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tower::Service;

use crate::client::{BufferedService, ClientSettings, map_buffer_error, try_acquire_buffer_slot};
use crate::compress::compress;
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::headers::HeaderPatch;
use crate::response::{HttpResponse, ResponseBody};

/// Encodings the client can decode, advertised on every request
pub const ACCEPT_ENCODING_VALUE: &str = "gzip, br, zstd";

/// Content type sent on every request
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// HTTP request builder with fluent API
///
/// Created by [`HttpClient::get`](crate::HttpClient::get),
/// [`HttpClient::post`](crate::HttpClient::post), etc.
///
/// Headers are assembled in a fixed order when the request is sent:
/// `Accept-Encoding`, `Content-Type`, `User-Agent`, `Content-Encoding` (for
/// compressed JSON bodies), then the client's default [`HeaderPatch`], then
/// the directives added on this builder.
///
/// # Example
///
/// ```ignore
/// let reply: Reply = client
///     .post("https://api.example.com/items")
///     .header("authorization", "Bearer token")
///     .json(&NewItem { name: "widget" })?
///     .send_json()
///     .await?;
/// ```
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    service: BufferedService,
    settings: Arc<ClientSettings>,
    method: http::Method,
    url: String,
    patch: HeaderPatch,
    body: Bytes,
    content_encoding: Option<&'static str>,
    unknown_fields: UnknownFields,
    /// Error captured during building (deferred to `send()`)
    error: Option<HttpError>,
}

impl RequestBuilder {
    pub(crate) fn new(
        service: BufferedService,
        settings: Arc<ClientSettings>,
        method: http::Method,
        url: String,
    ) -> Self {
        let unknown_fields = settings.unknown_fields;
        Self {
            service,
            settings,
            method,
            url,
            patch: HeaderPatch::new(),
            body: Bytes::new(),
            content_encoding: None,
            unknown_fields,
            error: None,
        }
    }

    /// Replace a header with a single value
    ///
    /// Invalid names or values are reported by [`send`](Self::send).
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.patch = self.patch.set(name, value);
            }
            (Err(e), _) => {
                self.error = Some(HttpError::InvalidHeaderName(e));
            }
            (_, Err(e)) => {
                self.error = Some(HttpError::InvalidHeaderValue(e));
            }
        }
        self
    }

    /// Remove a header, including the ones the client sets by default
    pub fn remove_header(mut self, name: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        match HeaderName::try_from(name) {
            Ok(name) => self.patch = self.patch.remove(name),
            Err(e) => self.error = Some(HttpError::InvalidHeaderName(e)),
        }
        self
    }

    /// Add every directive of `patch`
    pub fn headers(mut self, patch: &HeaderPatch) -> Self {
        self.patch.extend(patch);
        self
    }

    /// Set request body as JSON
    ///
    /// The body is compressed with the client's `post_compression` setting
    /// and `Content-Encoding` is set accordingly.
    ///
    /// # Errors
    ///
    /// Returns `HttpError::Encode` if serialization fails and
    /// `HttpError::Compress` if the encoder fails.
    pub fn json<I: Serialize + ?Sized>(mut self, body: &I) -> Result<Self, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let compression = self.settings.post_compression;
        self.body = compress(compression, serde_json::to_vec(body)?)?;
        self.content_encoding = compression.content_encoding();
        Ok(self)
    }

    /// Set request body as raw bytes, sent without `Content-Encoding`
    pub fn body_bytes(mut self, body: Bytes) -> Self {
        self.body = body;
        self.content_encoding = None;
        self
    }

    /// Override the client's unknown-field policy for this request
    pub fn unknown_fields(mut self, unknown_fields: UnknownFields) -> Self {
        self.unknown_fields = unknown_fields;
        self
    }

    /// Validate URL and scheme against transport security configuration.
    fn validate_url(&self) -> Result<http::Uri, HttpError> {
        let uri: http::Uri =
            self.url
                .parse()
                .map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
                    url: self.url.clone(),
                    kind: InvalidUriKind::ParseError,
                    reason: e.to_string(),
                })?;

        if uri.authority().is_none() {
            return Err(HttpError::InvalidUri {
                url: self.url.clone(),
                kind: InvalidUriKind::MissingAuthority,
                reason: "missing host/authority".to_owned(),
            });
        }

        match uri.scheme_str() {
            Some("https") => Ok(uri),
            Some("http") => match self.settings.transport_security {
                TransportSecurity::AllowInsecureHttp => Ok(uri),
                TransportSecurity::TlsOnly => Err(HttpError::InvalidScheme {
                    scheme: "http".to_owned(),
                    reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
                }),
            },
            Some(scheme) => Err(HttpError::InvalidScheme {
                scheme: scheme.to_owned(),
                reason: "only http:// and https:// schemes are supported".to_owned(),
            }),
            None => Err(HttpError::InvalidUri {
                url: self.url.clone(),
                kind: InvalidUriKind::MissingScheme,
                reason: "missing scheme".to_owned(),
            }),
        }
    }

    fn assemble_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_ENCODING,
            HeaderValue::from_static(ACCEPT_ENCODING_VALUE),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(USER_AGENT, self.settings.user_agent.clone());
        if let Some(encoding) = self.content_encoding {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding));
        }
        self.settings.default_headers.apply(&mut headers);
        self.patch.apply(&mut headers);
        headers
    }

    /// Send the request and return the response
    ///
    /// Every status is returned as a response; only transport-level failures
    /// are errors here.
    ///
    /// # Errors
    ///
    /// Returns `HttpError` if:
    /// - a header or the body could not be built
    /// - the URL is invalid or its scheme is not allowed
    /// - the network fails or the request times out
    /// - the request buffer is full (`Overloaded`)
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let uri = self.validate_url()?;
        let headers = self.assemble_headers();

        let mut request = Request::builder()
            .method(self.method)
            .uri(uri)
            .body(Full::new(self.body))?;
        *request.headers_mut() = headers;

        // Fail-fast if buffer is full
        try_acquire_buffer_slot(&mut self.service).await?;

        let inner: Response<ResponseBody> =
            self.service.call(request).await.map_err(map_buffer_error)?;

        Ok(HttpResponse {
            inner,
            max_body_size: self.settings.max_body_size,
            unknown_fields: self.unknown_fields,
        })
    }

    /// Send the request and strictly decode the response as `T`
    ///
    /// # Errors
    /// Any error of [`send`](Self::send) or [`HttpResponse::json`].
    pub async fn send_json<T>(self) -> Result<T, HttpError>
    where
        T: DeserializeOwned + JsonShape,
    {
        self.send().await?.json().await
    }

    /// Send the request and decode the response as `A`, falling back to `B`
    ///
    /// # Errors
    /// Any error of [`send`](Self::send) or [`HttpResponse::json_or`].
    pub async fn send_json_or<A, B>(self) -> Result<Either<A, B>, HttpError>
    where
        A: DeserializeOwned + JsonShape,
        B: DeserializeOwned + JsonShape,
    {
        self.send().await?.json_or().await
    }
}

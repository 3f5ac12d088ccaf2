use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use http_body::Frame;
use http_body_util::BodyExt;
use httpjson_core::{Either, JsonShape, UnknownFields, decode_response, decode_response_or};
use pin_project_lite::pin_project;
use serde::de::DeserializeOwned;

use crate::error::HttpError;

/// Type alias for the boxed response body.
///
/// The body has been through the decompression layer, so it yields
/// decoded bytes whatever `Content-Encoding` the server used.
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

pin_project! {
    /// Body wrapper that enforces size limits during streaming.
    ///
    /// Tracks bytes read and returns [`HttpError::BodyTooLarge`] once the
    /// limit is exceeded.
    pub struct LimitedBody {
        #[pin]
        inner: ResponseBody,
        limit: usize,
        read: usize,
    }
}

impl LimitedBody {
    #[must_use]
    pub fn new(inner: ResponseBody, limit: usize) -> Self {
        Self {
            inner,
            limit,
            read: 0,
        }
    }

    /// Returns the number of bytes read so far.
    #[must_use]
    pub fn bytes_read(&self) -> usize {
        self.read
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl http_body::Body for LimitedBody {
    type Data = Bytes;
    type Error = HttpError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();

        match this.inner.poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    *this.read += data.len();
                    if *this.read > *this.limit {
                        return Poll::Ready(Some(Err(HttpError::BodyTooLarge {
                            limit: *this.limit,
                            actual: *this.read,
                        })));
                    }
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(HttpError::Transport(e)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// HTTP response wrapper with body-reading helpers
///
/// - `resp.bytes().await?` reads the raw (decompressed) body
/// - `resp.json::<T>().await?` strictly decodes the body and checks the status
/// - `resp.json_or::<A, B>().await?` tries `A`, then `B`
///
/// All body reads enforce the configured `max_body_size` limit.
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
    pub(crate) unknown_fields: UnknownFields,
}

impl HttpResponse {
    /// Get the response status code
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    /// Get the response headers
    ///
    /// `Content-Encoding` and `Content-Length` are removed when the body was
    /// decompressed.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Consume the wrapper and return the inner response with boxed body
    #[must_use]
    pub fn into_inner(self) -> Response<ResponseBody> {
        self.inner
    }

    /// Returns the response body as a size-limited stream.
    #[must_use]
    pub fn into_limited_body(self) -> LimitedBody {
        LimitedBody::new(self.inner.into_body(), self.max_body_size)
    }

    /// Read the response body as bytes without status check
    ///
    /// # Errors
    /// Returns `HttpError::BodyTooLarge` if the body exceeds the limit, or
    /// `HttpError::Transport` if the connection fails mid-body.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        let collected = self.into_limited_body().collect().await?;
        Ok(collected.to_bytes())
    }

    /// Read the response body as text without status check
    ///
    /// Invalid UTF-8 sequences are replaced with the Unicode replacement
    /// character.
    ///
    /// # Errors
    /// Same as [`bytes`](Self::bytes).
    pub async fn text(self) -> Result<String, HttpError> {
        let body = self.bytes().await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Decode the body as `T`.
    ///
    /// Unknown keys are rejected unless the client or request was configured
    /// with [`UnknownFields::Ignore`]. A status of 400 or above is an error
    /// even when the body decodes.
    ///
    /// # Errors
    /// Returns `HttpError::Json` with every decode failure, the status error
    /// and the raw body; body read errors as in [`bytes`](Self::bytes).
    ///
    /// # Example
    ///
    /// ```ignore
    /// match client.get(url).send().await?.json::<Reply>().await {
    ///     Ok(reply) => println!("{reply:?}"),
    ///     Err(HttpError::Json(err)) => {
    ///         for diagnostic in err.unknown_fields() {
    ///             eprintln!("{diagnostic}");
    ///         }
    ///     }
    ///     Err(err) => return Err(err),
    /// }
    /// ```
    pub async fn json<T>(self) -> Result<T, HttpError>
    where
        T: DeserializeOwned + JsonShape,
    {
        let status = self.status();
        let unknown_fields = self.unknown_fields;
        let body = self.bytes().await?;
        Ok(decode_response(status, body, unknown_fields)?)
    }

    /// Decode the body as `A`, falling back to `B`.
    ///
    /// # Errors
    /// Same as [`json`](Self::json); the error records both rejected
    /// alternatives.
    pub async fn json_or<A, B>(self) -> Result<Either<A, B>, HttpError>
    where
        A: DeserializeOwned + JsonShape,
        B: DeserializeOwned + JsonShape,
    {
        let status = self.status();
        let unknown_fields = self.unknown_fields;
        let body = self.bytes().await?;
        Ok(decode_response_or(status, body, unknown_fields)?)
    }

    /// Returns the configured max body size for this response.
    #[must_use]
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }
}

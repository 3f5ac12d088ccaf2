use std::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bytes::Bytes;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, Request, Response};
use http_body::{Body, Frame, SizeHint};
use http_body_util::{BodyExt, Full};
use tower::{Layer, Service};
use tracing::Level;

use crate::error::HttpError;
use crate::response::ResponseBody;

/// Emit an event at a level only known at runtime.
macro_rules! event_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            Level::ERROR => tracing::error!($($arg)+),
            Level::WARN => tracing::warn!($($arg)+),
            Level::INFO => tracing::info!($($arg)+),
            Level::DEBUG => tracing::debug!($($arg)+),
            Level::TRACE => tracing::trace!($($arg)+),
        }
    };
}

/// Random 16-character URL-safe id tying the events of one exchange together.
fn request_id() -> String {
    URL_SAFE_NO_PAD.encode(rand::random::<[u8; 12]>())
}

fn header_str<'h>(headers: &'h HeaderMap, name: &http::header::HeaderName) -> &'h str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

/// Tower layer that logs every exchange through `tracing`
///
/// Three events share an `id` and carry the elapsed time as `dur`:
/// - the request: `url`, `method`, `content_encoding`
/// - the response head: `status`, `content_encoding`, `content_length`,
///   `content_type`
/// - the body release: `size` in bytes and the first body `error`, if any
///
/// Events use the configured level, except transport and body failures,
/// which are logged at `ERROR`. Headers are logged as received, before
/// decompression.
#[derive(Clone, Copy, Debug)]
pub struct LogLayer {
    level: Level,
}

impl LogLayer {
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl<S> Layer<S> for LogLayer {
    type Service = LogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LogService {
            inner,
            level: self.level,
        }
    }
}

/// Service produced by [`LogLayer`]
#[derive(Clone)]
pub struct LogService<S> {
    inner: S,
    level: Level,
}

impl<S> Service<Request<Full<Bytes>>> for LogService<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<ResponseBody>, Error = HttpError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = Response<ResponseBody>;
    type Error = HttpError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
        let level = self.level;
        let id = request_id();
        let start = Instant::now();

        event_at!(
            level,
            id = %id,
            dur = ?start.elapsed(),
            url = %req.uri(),
            method = %req.method(),
            content_encoding = header_str(req.headers(), &CONTENT_ENCODING),
            "http"
        );

        // Swap so we call the instance that was poll_ready'd
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match inner.call(req).await {
                Ok(response) => {
                    let headers = response.headers();
                    event_at!(
                        level,
                        id = %id,
                        dur = ?start.elapsed(),
                        status = response.status().as_u16(),
                        content_encoding = header_str(headers, &CONTENT_ENCODING),
                        content_length = header_str(headers, &CONTENT_LENGTH),
                        content_type = header_str(headers, &CONTENT_TYPE),
                        "http"
                    );
                    let (parts, body) = response.into_parts();
                    let body = LogBody {
                        inner: body,
                        id,
                        level,
                        start,
                        size: 0,
                        error: None,
                    };
                    Ok(Response::from_parts(parts, body.boxed()))
                }
                Err(err) => {
                    tracing::error!(id = %id, dur = ?start.elapsed(), error = %err, "http");
                    Err(err)
                }
            }
        })
    }
}

/// Response body that counts bytes and logs once it is released.
struct LogBody {
    inner: ResponseBody,
    id: String,
    level: Level,
    start: Instant,
    size: usize,
    error: Option<String>,
}

impl Body for LogBody {
    type Data = Bytes;
    type Error = Box<dyn Error + Send + Sync>;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.size += data.len();
                }
            }
            Poll::Ready(Some(Err(err))) if this.error.is_none() => {
                this.error = Some(err.to_string());
            }
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for LogBody {
    fn drop(&mut self) {
        match &self.error {
            Some(error) => tracing::error!(
                id = %self.id,
                dur = ?self.start.elapsed(),
                size = self.size,
                error = %error,
                "http"
            ),
            None => event_at!(
                self.level,
                id = %self.id,
                dur = ?self.start.elapsed(),
                size = self.size,
                "http"
            ),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::HttpClient;
    use crate::headers::HeaderPatch;
    use httpjson_core::JsonShape;
    use httpmock::prelude::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;

    type Fields = BTreeMap<String, String>;

    #[derive(Clone, Default)]
    struct EventCapture {
        events: Arc<Mutex<Vec<(Level, Fields)>>>,
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCapture {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if !event.metadata().target().starts_with("httpjson::layers") {
                return;
            }
            let mut visitor = FieldVisitor(Fields::new());
            event.record(&mut visitor);
            self.events
                .lock()
                .unwrap()
                .push((*event.metadata().level(), visitor.0));
        }
    }

    struct FieldVisitor(Fields);

    impl tracing::field::Visit for FieldVisitor {
        fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
            self.0.insert(field.name().to_owned(), value.to_owned());
        }

        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.0.insert(field.name().to_owned(), format!("{value:?}"));
        }
    }

    #[derive(Debug, Deserialize, JsonShape)]
    struct Message {
        message: String,
    }

    #[test]
    fn test_request_id_shape() {
        let id = request_id();
        assert_eq!(id.len(), 16);
        assert!(
            id.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(id, request_id());
    }

    #[tokio::test]
    async fn test_logs_request_response_and_body() {
        let capture = EventCapture::default();
        let events = Arc::clone(&capture.events);
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(capture));

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/log");
            then.status(200)
                .header("content-type", "application/json; charset=utf-8")
                .body(r#"{"message": "Working"}"#);
        });

        let client = HttpClient::builder()
            .allow_insecure_http()
            .log_level(Level::INFO)
            .build()
            .unwrap();
        let out: Message = client
            .get_json(&server.url("/log"), &HeaderPatch::new())
            .await
            .unwrap();
        assert_eq!(out.message, "Working");

        let events = events.lock().unwrap();
        assert!(events.iter().all(|(level, _)| *level == Level::INFO));
        let [(_, request), (_, head), (_, body)] = events.as_slice() else {
            panic!("expected three events, got {events:?}");
        };

        assert_eq!(request["method"], "GET");
        assert_eq!(request["url"], server.url("/log"));
        assert_eq!(request["content_encoding"], "");
        assert_eq!(request["id"].len(), 16);

        assert_eq!(head["status"], "200");
        assert_eq!(head["content_length"], "22");
        assert_eq!(head["content_type"], "application/json; charset=utf-8");
        assert_eq!(head["id"], request["id"]);

        assert_eq!(body["size"], "22");
        assert!(!body.contains_key("error"));
        assert!(body.contains_key("dur"));
    }

    #[tokio::test]
    async fn test_transport_failure_logged_at_error() {
        let capture = EventCapture::default();
        let events = Arc::clone(&capture.events);
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(capture));

        let client = HttpClient::builder()
            .allow_insecure_http()
            .log_level(Level::DEBUG)
            .build()
            .unwrap();
        let err = client.get("http://127.0.0.1:1/").send().await.unwrap_err();
        assert!(matches!(err, HttpError::Transport(_)));

        let events = events.lock().unwrap();
        let (level, fields) = events.last().unwrap();
        assert_eq!(*level, Level::ERROR);
        assert!(fields.contains_key("error"));
        assert_eq!(events[0].0, Level::DEBUG);
    }
}

use std::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use http_body::{Body, Frame, SizeHint};
use http_body_util::{BodyExt, Full};
use tokio::sync::mpsc::UnboundedSender;
use tower::{Layer, Service};

use crate::error::HttpError;
use crate::response::ResponseBody;

/// One captured exchange.
///
/// Headers and body are recorded as the server sent them, before
/// decompression.
#[derive(Debug, Clone)]
pub struct Record {
    pub method: Method,
    pub uri: Uri,
    pub request_headers: HeaderMap,
    /// Absent when the request failed before a response arrived.
    pub response: Option<CapturedResponse>,
    /// Transport failure, or the first error met while reading the body.
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// The part of the body that was read before it was released.
    pub body: Bytes,
}

/// Tower layer that sends a [`Record`] of every exchange over a channel
///
/// The record is sent when the response body is released, so it holds
/// whatever the caller read. Failed requests are sent right away.
#[derive(Clone, Debug)]
pub struct CaptureLayer {
    sender: UnboundedSender<Record>,
}

impl CaptureLayer {
    #[must_use]
    pub fn new(sender: UnboundedSender<Record>) -> Self {
        Self { sender }
    }
}

impl<S> Layer<S> for CaptureLayer {
    type Service = CaptureService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CaptureService {
            inner,
            sender: self.sender.clone(),
        }
    }
}

/// Service produced by [`CaptureLayer`]
#[derive(Clone)]
pub struct CaptureService<S> {
    inner: S,
    sender: UnboundedSender<Record>,
}

fn deliver(sender: &UnboundedSender<Record>, record: Record) {
    if sender.send(record).is_err() {
        tracing::debug!("capture receiver dropped; record discarded");
    }
}

impl<S> Service<Request<Full<Bytes>>> for CaptureService<S>
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
        let mut record = Record {
            method: req.method().clone(),
            uri: req.uri().clone(),
            request_headers: req.headers().clone(),
            response: None,
            error: None,
        };
        let sender = self.sender.clone();

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match inner.call(req).await {
                Ok(response) => {
                    let (parts, body) = response.into_parts();
                    record.response = Some(CapturedResponse {
                        status: parts.status,
                        headers: parts.headers.clone(),
                        body: Bytes::new(),
                    });
                    let body = CaptureBody {
                        inner: body,
                        content: BytesMut::new(),
                        record: Some(record),
                        sender,
                    };
                    Ok(Response::from_parts(parts, body.boxed()))
                }
                Err(err) => {
                    record.error = Some(err.to_string());
                    deliver(&sender, record);
                    Err(err)
                }
            }
        })
    }
}

/// Response body that copies what is read and sends the record on release.
struct CaptureBody {
    inner: ResponseBody,
    content: BytesMut,
    record: Option<Record>,
    sender: UnboundedSender<Record>,
}

impl Body for CaptureBody {
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
                    this.content.extend_from_slice(data);
                }
            }
            Poll::Ready(Some(Err(err))) => {
                if let Some(record) = this.record.as_mut()
                    && record.error.is_none()
                {
                    record.error = Some(err.to_string());
                }
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

impl Drop for CaptureBody {
    fn drop(&mut self) {
        if let Some(mut record) = self.record.take() {
            if let Some(response) = record.response.as_mut() {
                response.body = std::mem::take(&mut self.content).freeze();
            }
            deliver(&self.sender, record);
        }
    }
}

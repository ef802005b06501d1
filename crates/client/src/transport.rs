//! Transport boundary
//!
//! The pipeline never talks to a network directly: it hands a
//! [`TransportRequest`] to an injected [`Transport`] and consumes whatever
//! [`TransportResponse`] comes back, and it opens sockets through an
//! injected [`SocketConnector`]. Both seams exist so tests (and embedders
//! with their own HTTP stack) can swap the wire out entirely.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::StreamExt;
use http::{HeaderMap, Method, StatusCode};
use std::error::Error;
use std::fmt;
use std::io;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failure shapes a transport distinguishes. The pipeline classifies
/// `Aborted` as a timeout-flagged network error and everything else as a
/// plain network error with the cause attached.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {source}")]
    Connect { source: Box<dyn Error + Send + Sync> },

    #[error("request aborted or timed out")]
    Aborted,

    #[error("transport failure: {source}")]
    Other { source: Box<dyn Error + Send + Sync> },
}

impl TransportError {
    pub fn connect(source: impl Error + Send + Sync + 'static) -> Self {
        Self::Connect { source: Box::new(source) }
    }

    pub fn other(source: impl Error + Send + Sync + 'static) -> Self {
        Self::Other { source: Box::new(source) }
    }
}

/// One multipart field; the flat dot/bracket encoding of the validated
/// form value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub value: String,
}

/// Outgoing body. `Multipart` deliberately carries parts rather than bytes:
/// the concrete transport owns boundary generation and therefore the
/// content-type header.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Bytes),
    Multipart(Vec<FormPart>),
}

/// Everything the transport needs to execute one attempt. The cancellation
/// token is cooperative: a transport that observes it cancelled should
/// return [`TransportError::Aborted`].
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub cancel: CancellationToken,
}

/// Response body, either fully buffered or an incremental byte source for
/// the streaming protocols.
pub enum ResponseBody {
    Full(Bytes),
    Stream(BoxStream<'static, io::Result<Bytes>>),
}

impl ResponseBody {
    /// Buffers the whole body. Plain calls use this; an io failure while
    /// reading is a network-class error.
    pub async fn collect(self) -> io::Result<Bytes> {
        match self {
            ResponseBody::Full(bytes) => Ok(bytes),
            ResponseBody::Stream(mut stream) => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buffer.extend_from_slice(&chunk?);
                }
                Ok(buffer.freeze())
            }
        }
    }

    /// The body as a byte stream, regardless of how it arrived.
    pub fn into_stream(self) -> BoxStream<'static, io::Result<Bytes>> {
        match self {
            ResponseBody::Full(bytes) => futures::stream::iter([Ok(bytes)]).boxed(),
            ResponseBody::Stream(stream) => stream,
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            ResponseBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// What came back from one transport attempt.
#[derive(Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl TransportResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self { status, headers: HeaderMap::new(), body: ResponseBody::Full(body.into()) }
    }

    pub fn streaming(status: StatusCode, body: BoxStream<'static, io::Result<Bytes>>) -> Self {
        Self { status, headers: HeaderMap::new(), body: ResponseBody::Stream(body) }
    }
}

/// The request-executing seam.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Adapts a plain async closure into a [`Transport`]; the standard way to
/// stub the wire in tests.
pub struct FnTransport<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(TransportRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<TransportResponse, TransportError>> + Send,
{
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        (self.f)(request).await
    }
}

pub fn transport_fn<F, Fut>(f: F) -> FnTransport<F>
where
    F: Fn(TransportRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<TransportResponse, TransportError>> + Send,
{
    FnTransport { f }
}

/// Write half of a connected socket. Frames carry the text form of one
/// JSON message. `close` must be idempotent.
#[async_trait]
pub trait SocketWriter: Send {
    async fn send_text(&mut self, text: String) -> io::Result<()>;

    async fn close(&mut self) -> io::Result<()>;
}

/// Read half of a connected socket.
#[async_trait]
pub trait SocketReader: Send {
    /// Next inbound frame; `None` means the peer closed.
    async fn next_frame(&mut self) -> Option<io::Result<String>>;
}

/// A connected socket, already split so the send and receive pumps can run
/// independently.
pub struct SocketDuplex {
    pub writer: Box<dyn SocketWriter>,
    pub reader: Box<dyn SocketReader>,
}

impl fmt::Debug for SocketDuplex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SocketDuplex")
    }
}

/// The socket-opening seam for WebSocket endpoints.
#[async_trait]
pub trait SocketConnector: Send + Sync {
    async fn connect(&self, url: &str, headers: &HeaderMap) -> Result<SocketDuplex, TransportError>;
}

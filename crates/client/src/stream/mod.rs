//! Streaming protocols
//!
//! Three chunk-framing contracts share one consumption model: a call opens
//! a [`Connection`] whose `chunks` field is a lazy, single-pass sequence of
//! [`Chunk`]s. Connection establishment failures are reported out of band
//! as a [`crate::ClientError`]; once the sequence is flowing, per-chunk
//! problems (malformed frame, payload failing schema validation) travel
//! in-band as [`Chunk::Error`] so one bad frame does not abort an otherwise
//! healthy long-lived connection.
//!
//! Dropping the `chunks` stream stops the pump task and releases the
//! underlying transport resource; natural end-of-stream and fatal
//! connection errors release it too, and a double release is a no-op.

pub(crate) mod ndjson;
pub(crate) mod sse;
pub(crate) mod ws;

pub use ws::SocketController;

use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use typact_schema::ValidationFailure;

/// One unit of a streaming sequence.
#[derive(Debug)]
pub enum Chunk {
    /// A named server-sent event with its validated payload.
    Event { name: String, data: serde_json::Value },
    /// One validated document of a line-delimited JSON stream.
    Json(serde_json::Value),
    /// One validated inbound WebSocket message.
    Message(serde_json::Value),
    /// An in-band failure; the sequence continues after it.
    Error(StreamError),
}

impl Chunk {
    pub fn is_error(&self) -> bool {
        matches!(self, Chunk::Error(_))
    }
}

/// Failures specific to streaming sequences.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("malformed frame: {reason}")]
    Parse { reason: String },

    #[error("event '{name}' has no declared schema")]
    UnknownEvent { name: String },

    #[error("chunk failed validation: {failure}")]
    Validation { failure: ValidationFailure },

    #[error("connection failed: {source}")]
    Connection {
        #[from]
        source: io::Error,
    },
}

impl StreamError {
    pub fn parse(reason: impl ToString) -> Self {
        Self::Parse { reason: reason.to_string() }
    }

    pub fn unknown_event(name: impl ToString) -> Self {
        Self::UnknownEvent { name: name.to_string() }
    }
}

impl From<ValidationFailure> for StreamError {
    fn from(failure: ValidationFailure) -> Self {
        Self::Validation { failure }
    }
}

/// Items a pump task produces: ordinary chunks flow through; an `Err` is a
/// fatal transport failure that terminates the sequence.
pub(crate) type PumpItem = Result<Chunk, StreamError>;

/// Lazy, single-pass sequence of validated chunks.
///
/// Implements [`Stream`]; iteration ends at natural end-of-stream or at a
/// fatal transport failure, which is then available via
/// [`ChunkStream::take_failure`].
pub struct ChunkStream {
    receiver: mpsc::Receiver<PumpItem>,
    failure: Option<StreamError>,
    done: bool,
}

impl ChunkStream {
    pub(crate) fn new(receiver: mpsc::Receiver<PumpItem>) -> Self {
        Self { receiver, failure: None, done: false }
    }

    /// The fatal failure that terminated the sequence, if any. In-band
    /// [`Chunk::Error`] items do not end up here.
    pub fn take_failure(&mut self) -> Option<StreamError> {
        self.failure.take()
    }
}

impl Stream for ChunkStream {
    type Item = Chunk;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.receiver.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(chunk)),
            Poll::Ready(Some(Err(fatal))) => {
                this.failure = Some(fatal);
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStream").field("done", &self.done).finish()
    }
}

/// An open streaming connection. `controller` is present only for
/// WebSocket endpoints.
#[derive(Debug)]
pub struct Connection {
    pub chunks: ChunkStream,
    pub controller: Option<SocketController>,
}

/// Callback form of chunk consumption.
///
/// Drives the sequence to completion: `on_message` fires per successful
/// chunk, `on_error` per in-band error chunk, and `on_close` exactly once
/// at natural end. A fatal underlying failure is surfaced once through
/// `on_error` and `on_close` is skipped.
pub async fn subscribe(
    mut chunks: ChunkStream,
    mut on_message: impl FnMut(Chunk),
    mut on_error: impl FnMut(&StreamError),
    on_close: impl FnOnce(),
) {
    while let Some(chunk) = chunks.next().await {
        match chunk {
            Chunk::Error(error) => on_error(&error),
            chunk => on_message(chunk),
        }
    }
    match chunks.take_failure() {
        Some(fatal) => on_error(&fatal),
        None => on_close(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use serde_json::json;

    #[tokio::test]
    async fn subscribe_fires_on_close_once_at_natural_end() {
        let (mut tx, rx) = mpsc::channel(4);
        tx.send(Ok(Chunk::Json(json!(1)))).await.unwrap();
        tx.send(Ok(Chunk::Error(StreamError::parse("bad line")))).await.unwrap();
        tx.send(Ok(Chunk::Json(json!(2)))).await.unwrap();
        drop(tx);

        let mut messages = 0;
        let mut errors = 0;
        let mut closes = 0;
        subscribe(
            ChunkStream::new(rx),
            |_| messages += 1,
            |_| errors += 1,
            || closes += 1,
        )
        .await;
        assert_eq!((messages, errors, closes), (2, 1, 1));
    }

    #[tokio::test]
    async fn fatal_failure_surfaces_through_on_error_and_skips_on_close() {
        let (mut tx, rx) = mpsc::channel(4);
        tx.send(Ok(Chunk::Json(json!(1)))).await.unwrap();
        tx.send(Err(StreamError::Connection { source: io::Error::other("reset") })).await.unwrap();
        drop(tx);

        let mut messages = 0;
        let mut errors = 0;
        let mut closes = 0;
        subscribe(
            ChunkStream::new(rx),
            |_| messages += 1,
            |_| errors += 1,
            || closes += 1,
        )
        .await;
        assert_eq!((messages, errors, closes), (1, 1, 0));
    }

    #[tokio::test]
    async fn stream_ends_after_fatal_item() {
        let (mut tx, rx) = mpsc::channel(4);
        tx.send(Err(StreamError::Connection { source: io::Error::other("reset") })).await.unwrap();
        drop(tx);

        let mut stream = ChunkStream::new(rx);
        assert!(stream.next().await.is_none());
        assert!(stream.take_failure().is_some());
        // already done: polling again stays ended
        assert!(stream.next().await.is_none());
    }
}

//! WebSocket duplex consumption
//!
//! On a successful upgrade the caller gets a [`SocketController`] for the
//! outbound direction and a chunk stream for the inbound one. Outbound
//! messages validate against the client-to-server schema before any frame
//! is written — an invalid message fails synchronously at `send`. Inbound
//! frames validate against the server-to-client schema; an invalid frame
//! surfaces as an error chunk without closing the socket.
//!
//! Internally the two socket halves run in separate pump tasks. The write
//! pump owns the writer and a command channel; the read pump owns the
//! reader and the chunk channel. Either side shutting down cancels the
//! shared stop token so the other releases its half, and every release
//! path is guarded, so closing twice is a no-op.

use crate::error::{ClientError, InputKind};
use crate::stream::{Chunk, ChunkStream, StreamError};
use crate::transport::SocketDuplex;
use futures::SinkExt;
use serde_json::Value;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio_util::sync::CancellationToken;
use typact_schema::Schema;

enum Command {
    Send(String),
    Close,
}

/// Outbound handle for a WebSocket connection.
pub struct SocketController {
    commands: UnboundedSender<Command>,
    send_schema: Schema,
    closed: Arc<AtomicBool>,
}

impl SocketController {
    /// Validates and queues one outbound message. Validation failures are
    /// synchronous; nothing is transmitted for an invalid message.
    pub fn send(&self, message: &Value) -> Result<(), ClientError> {
        let validated = self
            .send_schema
            .parse(message)
            .map_err(|failure| ClientError::request_validation(InputKind::Message, failure))?;
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::network(io::Error::other("socket is closed")));
        }
        self.commands
            .send(Command::Send(validated.to_string()))
            .map_err(|_| ClientError::network(io::Error::other("socket is closed")))
    }

    /// Closes the socket. Idempotent: repeated calls, and calls racing the
    /// socket's own shutdown, are no-ops.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.commands.send(Command::Close);
        }
    }
}

impl fmt::Debug for SocketController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketController").field("closed", &self.closed.load(Ordering::SeqCst)).finish()
    }
}

fn inbound_chunk(receive: &Schema, text: &str) -> Chunk {
    let payload: Value = match serde_json::from_str(text) {
        Ok(payload) => payload,
        Err(e) => return Chunk::Error(StreamError::parse(e)),
    };
    match receive.parse(&payload) {
        Ok(value) => Chunk::Message(value),
        Err(failure) => Chunk::Error(StreamError::from(failure)),
    }
}

/// Spawns the duplex pumps over an upgraded socket.
pub(crate) fn open(send_schema: Schema, receive_schema: Schema, socket: SocketDuplex) -> (ChunkStream, SocketController) {
    let SocketDuplex { mut writer, mut reader } = socket;
    let (chunk_tx, chunk_rx) = futures::channel::mpsc::channel(16);
    let (command_tx, mut command_rx) = unbounded_channel();
    let stop = CancellationToken::new();

    let controller = SocketController {
        commands: command_tx,
        send_schema,
        closed: Arc::new(AtomicBool::new(false)),
    };

    // write pump: owns the writer; stops on Close, controller drop, write
    // failure, or the read side ending
    let write_stop = stop.clone();
    let mut write_err_tx = chunk_tx.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                // drain queued commands before honoring the stop token, so
                // a send racing the read side's shutdown is not dropped
                biased;
                command = command_rx.recv() => match command {
                    Some(Command::Send(text)) => {
                        if let Err(e) = writer.send_text(text).await {
                            let _ = write_err_tx.send(Err(StreamError::from(e))).await;
                            let _ = writer.close().await;
                            write_stop.cancel();
                            break;
                        }
                    }
                    Some(Command::Close) | None => {
                        let _ = writer.close().await;
                        write_stop.cancel();
                        break;
                    }
                },
                _ = write_stop.cancelled() => {
                    let _ = writer.close().await;
                    break;
                }
            }
        }
    });

    // read pump: owns the reader and the chunk channel
    let mut tx = chunk_tx;
    tokio::spawn(async move {
        let _stop_guard = stop.clone().drop_guard();
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                frame = reader.next_frame() => match frame {
                    None => break,
                    Some(Ok(text)) => {
                        let chunk = inbound_chunk(&receive_schema, &text);
                        if tx.send(Ok(chunk)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        let _ = tx.send(Err(StreamError::from(e))).await;
                        break;
                    }
                },
            }
        }
    });

    (ChunkStream::new(chunk_rx), controller)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{SocketReader, SocketWriter};
    use async_trait::async_trait;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct RecordingWriter {
        sent: Arc<Mutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl SocketWriter for RecordingWriter {
        async fn send_text(&mut self, text: String) -> io::Result<()> {
            self.sent.lock().unwrap().push(text);
            Ok(())
        }

        async fn close(&mut self) -> io::Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ScriptedReader {
        frames: mpsc::UnboundedReceiver<io::Result<String>>,
    }

    #[async_trait]
    impl SocketReader for ScriptedReader {
        async fn next_frame(&mut self) -> Option<io::Result<String>> {
            self.frames.recv().await
        }
    }

    struct Harness {
        sent: Arc<Mutex<Vec<String>>>,
        writer_closed: Arc<AtomicBool>,
        inbound: mpsc::UnboundedSender<io::Result<String>>,
        chunks: ChunkStream,
        controller: SocketController,
    }

    fn harness(send_schema: Schema, receive_schema: Schema) -> Harness {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let writer_closed = Arc::new(AtomicBool::new(false));
        let (inbound, frames) = mpsc::unbounded_channel();
        let duplex = SocketDuplex {
            writer: Box::new(RecordingWriter { sent: Arc::clone(&sent), closed: Arc::clone(&writer_closed) }),
            reader: Box::new(ScriptedReader { frames }),
        };
        let (chunks, controller) = open(send_schema, receive_schema, duplex);
        Harness { sent, writer_closed, inbound, chunks, controller }
    }

    fn message_schema() -> Schema {
        Schema::object([("text", Schema::string())])
    }

    #[tokio::test]
    async fn invalid_outbound_message_fails_synchronously() {
        let mut h = harness(message_schema(), Schema::Unknown);
        let err = h.controller.send(&json!({"wrong": true})).unwrap_err();
        assert!(matches!(err, ClientError::Validation { .. }));

        // nothing was transmitted
        h.controller.close();
        drop(h.inbound);
        while h.chunks.next().await.is_some() {}
        assert!(h.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn valid_outbound_message_reaches_the_writer() {
        let mut h = harness(message_schema(), Schema::Unknown);
        h.controller.send(&json!({"text": "hello"})).unwrap();
        h.controller.close();
        drop(h.inbound);
        while h.chunks.next().await.is_some() {}
        assert_eq!(h.sent.lock().unwrap().as_slice(), [r#"{"text":"hello"}"#]);
    }

    #[tokio::test]
    async fn inbound_frames_validate_and_surface_as_message_chunks() {
        let mut h = harness(Schema::Unknown, message_schema());
        h.inbound.send(Ok(json!({"text": "hi"}).to_string())).unwrap();
        h.inbound.send(Ok("{broken".to_string())).unwrap();
        h.inbound.send(Ok(json!({"text": 5}).to_string())).unwrap();
        h.inbound.send(Ok(json!({"text": "again"}).to_string())).unwrap();
        drop(h.inbound);

        let chunks: Vec<Chunk> = (&mut h.chunks).collect().await;
        assert_eq!(chunks.len(), 4);
        assert!(matches!(&chunks[0], Chunk::Message(v) if v == &json!({"text": "hi"})));
        assert!(matches!(&chunks[1], Chunk::Error(StreamError::Parse { .. })));
        assert!(matches!(&chunks[2], Chunk::Error(StreamError::Validation { .. })));
        assert!(matches!(&chunks[3], Chunk::Message(v) if v == &json!({"text": "again"})));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_releases_the_writer() {
        let mut h = harness(Schema::Unknown, Schema::Unknown);
        h.controller.close();
        h.controller.close();
        while h.chunks.next().await.is_some() {}
        assert!(h.writer_closed.load(Ordering::SeqCst));
        assert!(h.controller.send(&json!({})).is_err());
    }

    #[tokio::test]
    async fn read_failure_is_fatal_and_stops_the_sequence() {
        let mut h = harness(Schema::Unknown, Schema::Unknown);
        h.inbound.send(Err(io::Error::other("reset by peer"))).unwrap();

        assert!(h.chunks.next().await.is_none());
        assert!(matches!(h.chunks.take_failure(), Some(StreamError::Connection { .. })));
    }
}

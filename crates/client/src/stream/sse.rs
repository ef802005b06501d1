//! Server-sent events framing and consumption
//!
//! The wire format is line-based: `event:` names the frame, one or more
//! `data:` lines carry the payload, and a blank line dispatches the frame.
//! Comment lines (leading `:`) and fields this client does not consume
//! (`id:`, `retry:`) are skipped. A frame with no data lines dispatches
//! nothing, per the SSE processing model.

use crate::stream::{Chunk, ChunkStream, PumpItem, StreamError};
use bytes::{Buf, Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{SinkExt, StreamExt};
use std::io;
use tokio_util::codec::{Decoder, FramedRead};
use tokio_util::io::StreamReader;
use typact_schema::Schema;

/// One dispatched SSE frame, before payload validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    /// `event:` field; the wire default event type is `message`.
    pub name: Option<String>,
    /// `data:` lines joined with newlines.
    pub data: String,
}

/// Streaming decoder from raw bytes to dispatched frames.
///
/// Accumulates field lines until the blank-line dispatch point; incomplete
/// frames at end-of-stream are discarded, matching browser behavior.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    event_name: Option<String>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn take_frame(&mut self) -> Option<SseFrame> {
        let name = self.event_name.take();
        let lines = std::mem::take(&mut self.data_lines);
        if lines.is_empty() {
            return None;
        }
        Some(SseFrame { name, data: lines.join("\n") })
    }

    fn field_line(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event_name = Some(value.to_string()),
            "data" => self.data_lines.push(value.to_string()),
            // id and retry are connection-management fields this client
            // does not consume
            _ => {}
        }
    }
}

impl Decoder for SseDecoder {
    type Item = SseFrame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(pos) = src.iter().position(|b| *b == b'\n') {
            let raw = src.split_to(pos + 1);
            let line = std::str::from_utf8(&raw[..pos])
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
                .trim_end_matches('\r');

            if line.is_empty() {
                if let Some(frame) = self.take_frame() {
                    return Ok(Some(frame));
                }
                continue;
            }
            self.field_line(line);
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        // discard any partially accumulated frame and trailing bytes
        src.advance(src.remaining());
        self.event_name = None;
        self.data_lines.clear();
        Ok(None)
    }
}

/// Validates one dispatched frame against the endpoint's per-event schema
/// map.
fn frame_chunk(events: &[(String, Schema)], frame: SseFrame) -> Chunk {
    let name = frame.name.unwrap_or_else(|| "message".to_string());
    let Some((_, schema)) = events.iter().find(|(event, _)| *event == name) else {
        return Chunk::Error(StreamError::unknown_event(name));
    };
    let payload: serde_json::Value = match serde_json::from_str(&frame.data) {
        Ok(payload) => payload,
        Err(e) => return Chunk::Error(StreamError::parse(e)),
    };
    match schema.parse(&payload) {
        Ok(data) => Chunk::Event { name, data },
        Err(failure) => Chunk::Error(StreamError::from(failure)),
    }
}

/// Spawns the pump that turns a response byte stream into validated event
/// chunks. The pump stops — releasing the byte source — when the caller
/// drops the chunk stream, the body ends, or a read fails.
pub(crate) fn open(events: Vec<(String, Schema)>, bytes: BoxStream<'static, io::Result<Bytes>>) -> ChunkStream {
    let (mut tx, rx) = futures::channel::mpsc::channel(16);
    tokio::spawn(async move {
        let mut frames = FramedRead::new(StreamReader::new(bytes), SseDecoder::new());
        while let Some(next) = frames.next().await {
            let item: PumpItem = match next {
                Ok(frame) => Ok(frame_chunk(&events, frame)),
                Err(e) => Err(StreamError::from(e)),
            };
            let fatal = item.is_err();
            if tx.send(item).await.is_err() || fatal {
                break;
            }
        }
    });
    ChunkStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use serde_json::json;
    use typact_schema::Schema;

    fn decode_all(input: &str) -> Vec<SseFrame> {
        let mut decoder = SseDecoder::new();
        let mut buffer = BytesMut::from(input.as_bytes());
        let mut frames = Vec::new();
        while let Some(frame) = decoder.decode(&mut buffer).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn decodes_named_event_with_data() {
        let frames = decode_all("event: tick\ndata: {\"n\":1}\n\n");
        assert_eq!(frames, vec![SseFrame { name: Some("tick".to_string()), data: "{\"n\":1}".to_string() }]);
    }

    #[test]
    fn unnamed_frame_has_no_event_field() {
        let frames = decode_all("data: hello\n\n");
        assert_eq!(frames[0].name, None);
    }

    #[test]
    fn multi_line_data_joins_with_newline() {
        let input = indoc! {"
            data: first
            data: second

        "};
        assert_eq!(decode_all(input)[0].data, "first\nsecond");
    }

    #[test]
    fn comments_and_unknown_fields_are_skipped() {
        let input = indoc! {"
            : keep-alive
            id: 42
            retry: 1000
            data: payload

        "};
        let frames = decode_all(input);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "payload");
    }

    #[test]
    fn blank_line_without_data_dispatches_nothing() {
        assert!(decode_all("\n\nevent: tick\n\n").is_empty());
    }

    #[test]
    fn crlf_line_endings_are_tolerated() {
        let frames = decode_all("event: tick\r\ndata: 1\r\n\r\n");
        assert_eq!(frames[0].name.as_deref(), Some("tick"));
        assert_eq!(frames[0].data, "1");
    }

    #[test]
    fn partial_line_waits_for_more_input() {
        let mut decoder = SseDecoder::new();
        let mut buffer = BytesMut::from(&b"data: par"[..]);
        assert!(decoder.decode(&mut buffer).unwrap().is_none());
        buffer.extend_from_slice(b"tial\n\n");
        assert_eq!(decoder.decode(&mut buffer).unwrap().unwrap().data, "partial");
    }

    fn event_map() -> Vec<(String, Schema)> {
        vec![(
            "message".to_string(),
            Schema::object([("type", Schema::string()), ("data", Schema::string())]),
        )]
    }

    #[test]
    fn unknown_event_name_becomes_error_chunk() {
        let chunk = frame_chunk(&event_map(), SseFrame { name: Some("mystery".to_string()), data: "{}".to_string() });
        assert!(matches!(chunk, Chunk::Error(StreamError::UnknownEvent { .. })));
    }

    #[test]
    fn invalid_payload_becomes_error_chunk() {
        let chunk = frame_chunk(&event_map(), SseFrame { name: None, data: "{\"type\":1}".to_string() });
        assert!(matches!(chunk, Chunk::Error(StreamError::Validation { .. })));
    }

    #[test]
    fn valid_payload_becomes_event_chunk() {
        let data = json!({"type": "greeting", "data": "hi"}).to_string();
        let chunk = frame_chunk(&event_map(), SseFrame { name: None, data });
        match chunk {
            Chunk::Event { name, data } => {
                assert_eq!(name, "message");
                assert_eq!(data, json!({"type": "greeting", "data": "hi"}));
            }
            other => panic!("unexpected chunk: {other:?}"),
        }
    }
}

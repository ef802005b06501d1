//! Newline-delimited JSON consumption
//!
//! The server writes one JSON document per line. Each line parses and
//! validates against the endpoint's declared item schema; a malformed line
//! or failing payload yields an in-band error chunk and the sequence
//! continues.

use crate::stream::{Chunk, ChunkStream, PumpItem, StreamError};
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{SinkExt, StreamExt};
use std::io;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;
use typact_schema::Schema;

/// Longest accepted line. A longer line surfaces as an in-band parse error
/// and the codec discards up to the next newline, so the sequence
/// continues.
pub(crate) const MAX_LINE_LENGTH: usize = 1024 * 1024;

fn line_chunk(item: &Schema, line: &str) -> Option<Chunk> {
    if line.trim().is_empty() {
        return None;
    }
    let payload: serde_json::Value = match serde_json::from_str(line) {
        Ok(payload) => payload,
        Err(e) => return Some(Chunk::Error(StreamError::parse(e))),
    };
    match item.parse(&payload) {
        Ok(value) => Some(Chunk::Json(value)),
        Err(failure) => Some(Chunk::Error(StreamError::from(failure))),
    }
}

/// Spawns the pump that turns a response byte stream into one validated
/// chunk per line.
pub(crate) fn open(item: Schema, bytes: BoxStream<'static, io::Result<Bytes>>) -> ChunkStream {
    let (mut tx, rx) = futures::channel::mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines =
            FramedRead::new(StreamReader::new(bytes), LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
        while let Some(next) = lines.next().await {
            let item_out: Option<PumpItem> = match next {
                Ok(line) => line_chunk(&item, &line).map(Ok),
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    Some(Ok(Chunk::Error(StreamError::parse("line exceeds maximum length"))))
                }
                Err(LinesCodecError::Io(e)) => Some(Err(StreamError::Connection { source: e })),
            };
            let Some(item_out) = item_out else {
                continue;
            };
            let fatal = item_out.is_err();
            if tx.send(item_out).await.is_err() || fatal {
                break;
            }
        }
    });
    ChunkStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item_schema() -> Schema {
        Schema::object([("seq", Schema::integer())])
    }

    #[test]
    fn valid_line_becomes_json_chunk() {
        let chunk = line_chunk(&item_schema(), r#"{"seq": 1}"#).unwrap();
        match chunk {
            Chunk::Json(value) => assert_eq!(value, json!({"seq": 1})),
            other => panic!("unexpected chunk: {other:?}"),
        }
    }

    #[test]
    fn malformed_json_becomes_parse_error_chunk() {
        let chunk = line_chunk(&item_schema(), "{not json").unwrap();
        assert!(matches!(chunk, Chunk::Error(StreamError::Parse { .. })));
    }

    #[test]
    fn schema_rejection_becomes_validation_error_chunk() {
        let chunk = line_chunk(&item_schema(), r#"{"seq": "one"}"#).unwrap();
        assert!(matches!(chunk, Chunk::Error(StreamError::Validation { .. })));
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert!(line_chunk(&item_schema(), "   ").is_none());
    }

    #[tokio::test]
    async fn oversized_line_is_an_in_band_error_and_the_stream_continues() {
        let body = format!("{}\n{{\"seq\": 1}}\n", "x".repeat(MAX_LINE_LENGTH + 1));
        let bytes = futures::stream::iter([Ok(Bytes::from(body))]).boxed();
        let chunks: Vec<Chunk> = open(item_schema(), bytes).collect().await;
        assert_eq!(chunks.len(), 2);
        assert!(matches!(&chunks[0], Chunk::Error(StreamError::Parse { .. })));
        assert!(matches!(&chunks[1], Chunk::Json(v) if v == &json!({"seq": 1})));
    }
}

//! Server-Sent Events record parsing.
//!
//! The backend streams one JSON chunk per `data:` line and ends with a
//! sentinel:
//! ```text
//! data: {"content": "Hel"}
//!
//! data: {"content": "lo", "is_final": true, "tool_calls": []}
//!
//! data: [DONE]
//! ```
//! Any other line is ignored.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use tracing::warn;

use crate::client::ClientError;
use crate::decoder::LineDecoder;
use crate::model::{ChunkPayload, StreamEvent};

/// Result of parsing one decoded line.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// A payload to deliver.
    Event(StreamEvent),
    /// The completion sentinel.
    Done,
}

/// Parse an SSE line to extract the data portion.
///
/// SSE lines are in the format: `data: <content>`
///
/// # Example
/// ```
/// use chatwire::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// let line = "invalid";
/// assert_eq!(parse_sse_line(line), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix("data: ").map(|s| s.trim())
}

/// Check if an SSE data line indicates the stream is done.
///
/// # Example
/// ```
/// use chatwire::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker(""));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == "[DONE]"
}

/// Interpret a decoded line.
///
/// Returns `None` for lines without the `data: ` prefix and for heartbeat
/// lines that are blank after the prefix. Payloads that are not a JSON object
/// of the chunk shape come back as [`StreamEvent::Raw`].
pub fn parse_record(line: &str) -> Option<Record> {
    let data = parse_sse_line(line)?;
    if data.is_empty() {
        return None;
    }
    if is_done_marker(data) {
        return Some(Record::Done);
    }
    Some(Record::Event(parse_payload(data)))
}

fn parse_payload(data: &str) -> StreamEvent {
    let decoded = serde_json::from_str::<serde_json::Value>(data).and_then(|value| {
        if value.is_object() {
            serde_json::from_value::<ChunkPayload>(value).map(Some)
        } else {
            Ok(None)
        }
    });

    match decoded {
        Ok(Some(payload)) => payload.into_event(),
        Ok(None) => {
            warn!(payload = %data, "non-object stream payload, delivering as raw text");
            StreamEvent::Raw { text: data.to_string() }
        }
        Err(e) => {
            warn!(payload = %data, error = %e, "malformed stream payload, delivering as raw text");
            StreamEvent::Raw { text: data.to_string() }
        }
    }
}

/// Extension trait turning a body byte stream into typed stream events.
///
/// This is the pull-style counterpart of [`StreamSession`](crate::session::StreamSession):
/// same decoding and parsing, but the caller drives it and cancels by
/// dropping the stream.
///
/// # Example
/// ```ignore
/// use chatwire::sse::SseStreamExt;
///
/// let mut events = byte_stream.sse_events();
/// while let Some(event) = events.next().await {
///     println!("{:?}", event?);
/// }
/// ```
pub trait SseStreamExt {
    /// Yields events until the `[DONE]` sentinel or the end of the body.
    /// A transport error is yielded once and ends the stream.
    fn sse_events(self) -> impl Stream<Item = Result<StreamEvent, ClientError>> + Send
    where
        Self: Sized;
}

impl<S> SseStreamExt for S
where
    S: Stream<Item = Result<Bytes, ClientError>> + Send + 'static,
{
    fn sse_events(self) -> impl Stream<Item = Result<StreamEvent, ClientError>> + Send {
        stream::unfold(
            (Some(Box::pin(self)), LineDecoder::new(), VecDeque::<String>::new()),
            |(mut byte_stream, mut decoder, mut pending)| async move {
                loop {
                    // Drain lines already split off before reading more data
                    while let Some(line) = pending.pop_front() {
                        match parse_record(&line) {
                            Some(Record::Event(event)) => {
                                return Some((Ok(event), (byte_stream, decoder, pending)));
                            }
                            Some(Record::Done) => return None,
                            None => continue,
                        }
                    }

                    let body = byte_stream.as_mut()?;
                    match body.next().await {
                        Some(Ok(chunk)) => pending.extend(decoder.feed(&chunk)),
                        Some(Err(e)) => {
                            // Nothing is read after an error
                            return Some((Err(e), (None, decoder, pending)));
                        }
                        None => return None,
                    }
                }
            },
        )
    }
}

//! Server-Sent Events (SSE) framing.
//!
//! Turns an incrementally arriving byte stream into discrete records.
//! A record is a block of lines terminated by a blank line:
//!
//! ```text
//! event: question_chunk
//! data: {"content": "Tell me"}
//!
//! event: done
//! data: {}
//!
//! ```
//!
//! Bytes are decoded as UTF-8 with partial code points carried across
//! chunk boundaries, so the output does not depend on where the transport
//! happened to split the body.

use std::collections::VecDeque;

use futures::stream::{self, Stream, StreamExt};
use itertools::Itertools;
use tracing::{debug, warn};

use crate::client::ClientError;

/// Blank line separating two records.
pub const RECORD_DELIMITER: &str = "\n\n";

const EVENT_PREFIX: &str = "event:";
const DATA_PREFIX: &str = "data:";

/// One framed SSE record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseRecord {
    /// Value of the last `event:` line, if any.
    pub event: Option<String>,
    /// All `data:` lines of the record joined with `\n`.
    pub data: String,
}

impl SseRecord {
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }
}

/// Parse a raw record (delimiter already removed) into its event tag and data.
///
/// Lines that are neither `event:` nor `data:` (comments, unknown fields,
/// blanks) are skipped.
///
/// # Example
/// ```
/// use interview_client::sse::parse_record;
///
/// let record = parse_record("event: question_chunk\ndata: {\"content\":\"hi\"}");
/// assert_eq!(record.event.as_deref(), Some("question_chunk"));
/// assert_eq!(record.data, "{\"content\":\"hi\"}");
/// ```
pub fn parse_record(raw: &str) -> SseRecord {
    let mut event = None;
    let mut data_lines = Vec::new();

    for line in raw.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if let Some(value) = line.strip_prefix(EVENT_PREFIX) {
            let value = value.trim();
            event = (!value.is_empty()).then(|| value.to_string());
        } else if let Some(value) = line.strip_prefix(DATA_PREFIX) {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    SseRecord {
        event,
        data: data_lines.into_iter().join("\n"),
    }
}

/// Incremental UTF-8 decoder.
///
/// Trailing bytes of an incomplete code point are held back until the next
/// call. Invalid sequences decode to U+FFFD instead of failing.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning all text that is complete so far.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let input = if self.pending.is_empty() {
            bytes.to_vec()
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(bytes);
            joined
        };

        let mut out = String::with_capacity(input.len());
        let mut rest: &[u8] = &input;

        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));

                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // incomplete code point at the end of the chunk
                            self.pending.extend_from_slice(after);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Number of bytes held back waiting for the rest of a code point.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Flush at end of stream; a dangling partial code point becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

/// Stateful framer from raw bytes to [`SseRecord`]s.
///
/// After every [`feed`](SseDecoder::feed) the internal buffer holds no
/// complete record, only the tail of one still being received.
#[derive(Debug, Default)]
pub struct SseDecoder {
    utf8: Utf8StreamDecoder,
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every record it completed, in stream order.
    ///
    /// Records without any data (a bare `event:` line, keep-alive comments)
    /// are dropped.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseRecord> {
        let text = self.utf8.decode(bytes);

        // Text already buffered holds no delimiter, so only its last bytes
        // can start one that the new text completes.
        let mut scan_from = self.buffer.len().saturating_sub(RECORD_DELIMITER.len() - 1);
        while !self.buffer.is_char_boundary(scan_from) {
            scan_from -= 1;
        }

        self.buffer.push_str(&text);
        self.drain_records(scan_from)
    }

    fn drain_records(&mut self, mut scan_from: usize) -> Vec<SseRecord> {
        let mut records = Vec::new();

        while let Some(offset) = self.buffer[scan_from..].find(RECORD_DELIMITER) {
            let pos = scan_from + offset;
            let record = parse_record(&self.buffer[..pos]);
            self.buffer.drain(..pos + RECORD_DELIMITER.len());
            scan_from = 0;

            if record.has_data() {
                records.push(record);
            } else {
                debug!(event = ?record.event, "skipping sse record without data");
            }
        }

        records
    }

    /// Text received after the last complete record.
    pub fn remainder(&self) -> &str {
        &self.buffer
    }

    /// Signal end of stream.
    ///
    /// An unterminated trailing block is never dispatched; it is returned so
    /// the caller can log it.
    pub fn finish(&mut self) -> Option<String> {
        let tail = self.utf8.finish();
        self.buffer.push_str(&tail);
        let remainder = std::mem::take(&mut self.buffer);

        if remainder.trim().is_empty() {
            None
        } else {
            Some(remainder)
        }
    }
}

/// Extension trait turning a byte stream into a stream of SSE records.
///
/// Works on `reqwest::Response::bytes_stream()` as well as any in-memory
/// stream of byte chunks.
///
/// # Example
/// ```ignore
/// use interview_client::sse::SseStreamExt;
///
/// let response = client.post(url).send().await?;
/// let mut records = Box::pin(response.bytes_stream().sse_records());
/// while let Some(record) = records.next().await {
///     let record = record?;
///     println!("{:?}: {}", record.event, record.data);
/// }
/// ```
pub trait SseStreamExt {
    /// Frame the byte stream into records.
    ///
    /// A transport error is yielded once and ends the stream.
    fn sse_records(self) -> impl Stream<Item = Result<SseRecord, ClientError>> + Send;
}

impl<S, B, E> SseStreamExt for S
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<ClientError> + Send,
{
    fn sse_records(self) -> impl Stream<Item = Result<SseRecord, ClientError>> + Send {
        stream::unfold(
            (Box::pin(self), SseDecoder::new(), VecDeque::new(), false),
            |(mut byte_stream, mut decoder, mut ready, mut stream_ended)| async move {
                loop {
                    if let Some(record) = ready.pop_front() {
                        return Some((Ok(record), (byte_stream, decoder, ready, stream_ended)));
                    }

                    if stream_ended {
                        return None;
                    }

                    match byte_stream.next().await {
                        Some(Ok(chunk)) => {
                            ready.extend(decoder.feed(chunk.as_ref()));
                        }
                        Some(Err(e)) => {
                            stream_ended = true;
                            return Some((Err(e.into()), (byte_stream, decoder, ready, stream_ended)));
                        }
                        None => {
                            stream_ended = true;
                            if let Some(tail) = decoder.finish() {
                                warn!(bytes = tail.len(), "sse stream ended inside an unterminated record");
                            }
                        }
                    }
                }
            },
        )
    }
}

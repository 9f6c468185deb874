//! Server-sent event decoding over a byte stream.

use crate::Error;
use futures_util::{Stream, StreamExt};
use memchr::memmem;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Upper bound on bytes buffered while waiting for an event terminator.
const MAX_BUFFER: usize = 1_000_000;

const BOM: &[u8] = "\u{FEFF}".as_bytes();

/// One decoded event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event_type: Option<String>,
    /// Joined `data:` lines.
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            event_type: None,
            data: data.into(),
            id: None,
        }
    }

    /// `[DONE]` sentinels and blank payloads carry nothing to decode.
    pub fn is_empty_or_done(&self) -> bool {
        let data = self.data.trim();
        data.is_empty() || data == "[DONE]"
    }
}

/// Decodes SSE frames from a stream of byte chunks.
///
/// Carriage returns are dropped on the way into the buffer, so `\r\n`
/// framing is handled the same as `\n` framing. Raw bytes are buffered
/// until a blank line arrives, which keeps multi-byte characters that
/// straddle chunks intact.
pub struct SseStream<S> {
    inner: S,
    buffer: Vec<u8>,
    events: VecDeque<SseEvent>,
    /// Yielded once every frame decoded before it has been delivered.
    pending_error: Option<Error>,
    started: bool,
    finished: bool,
}

impl<S> SseStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            events: VecDeque::new(),
            pending_error: None,
            started: false,
            finished: false,
        }
    }

    fn push_bytes(&mut self, mut chunk: &[u8]) {
        if !self.started {
            self.started = true;
            if chunk.starts_with(BOM) {
                chunk = &chunk[BOM.len()..];
            }
        }
        self.buffer
            .extend(chunk.iter().copied().filter(|&b| b != b'\r'));
    }

    /// Move every complete frame in the buffer into the event queue.
    ///
    /// A frame that is not valid UTF-8 is dropped and parsing stops there; the
    /// error is queued behind the frames that preceded it.
    fn drain_frames(&mut self) {
        let finder = memmem::Finder::new(b"\n\n");
        let mut consumed = 0;

        while let Some(pos) = finder.find(&self.buffer[consumed..]) {
            let frame = &self.buffer[consumed..consumed + pos];
            let parsed = std::str::from_utf8(frame).map(parse_frame);
            consumed += pos + 2;
            match parsed {
                Ok(Some(event)) => self.events.push_back(event),
                Ok(None) => {}
                Err(e) => {
                    self.pending_error = Some(Error::streaming(format!(
                        "Invalid UTF-8 in SSE event: {e}"
                    )));
                    break;
                }
            }
        }

        if consumed > 0 {
            self.buffer.drain(..consumed);
        }
    }

    /// Decode whatever is left once the body ends without a final blank line.
    fn flush_tail(&mut self) -> Option<SseEvent> {
        let tail = std::mem::take(&mut self.buffer);
        match std::str::from_utf8(&tail) {
            Ok(text) if !text.trim().is_empty() => parse_frame(text),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Dropping {} undecodable trailing SSE bytes: {e}", tail.len());
                None
            }
        }
    }
}

/// Parse the lines of a single frame. Frames without data yield nothing.
fn parse_frame(text: &str) -> Option<SseEvent> {
    let mut event_type = None;
    let mut id = None;
    let mut data: Option<String> = None;

    for line in text.split('\n') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            "event" => event_type = Some(value.to_string()),
            "id" => id = Some(value.to_string()),
            _ => {}
        }
    }

    data.map(|data| SseEvent {
        event_type,
        data,
        id,
    })
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = Result<SseEvent, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if let Some(e) = self.pending_error.take() {
                return Poll::Ready(Some(Err(e)));
            }

            if self.finished {
                return Poll::Ready(None);
            }

            match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => {
                    self.push_bytes(&chunk);
                    self.drain_frames();
                    if self.buffer.len() > MAX_BUFFER {
                        // The partial frame is discarded; decoding resumes with the next bytes.
                        self.buffer.clear();
                        self.pending_error
                            .get_or_insert_with(|| Error::streaming("SSE buffer exceeded maximum size"));
                    }
                }
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(Error::streaming(format!("Stream error: {e}")))));
                }
                None => {
                    self.finished = true;
                    self.drain_frames();
                    if let Some(event) = self.flush_tail() {
                        self.events.push_back(event);
                    }
                }
            }
        }
    }
}

/// Extension trait to add SSE parsing to byte streams.
pub trait SseStreamExt: Stream {
    fn sse_events(self) -> SseStream<Self>
    where
        Self: Sized,
    {
        SseStream::new(self)
    }
}

impl<S: Stream> SseStreamExt for S {}

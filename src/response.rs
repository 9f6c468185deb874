//! Response handling for streamed generations.

use crate::accumulator::ReplyAccumulator;
use crate::{Error, FinishReason, StreamEvent, Usage};
use futures_util::stream::Stream;
use futures_util::StreamExt;
use std::pin::Pin;

/// Boxed stream of events produced by a backend.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, Error>> + Send>>;

/// A fully received reply.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteReply {
    /// Text chunks in the order they arrived.
    pub chunks: Vec<String>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl CompleteReply {
    /// Get all text content concatenated together.
    pub fn content(&self) -> String {
        self.chunks.concat()
    }
}

/// Response from a generation. Always streamed; buffer it with [`Response::collect`].
pub struct Response {
    stream: EventStream,
}

impl Response {
    /// Create a new response from a stream of events.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<StreamEvent, Error>> + Send + 'static,
    {
        Self {
            stream: Box::pin(stream),
        }
    }

    /// Stream the response events.
    pub fn stream(self) -> EventStream {
        self.stream
    }

    /// Buffer the entire response by consuming the stream.
    pub async fn collect(mut self) -> Result<CompleteReply, Error> {
        let mut accumulator = ReplyAccumulator::new();

        while let Some(event) = self.stream.next().await {
            accumulator.process_event(event?);
            if accumulator.is_done() {
                break;
            }
        }

        Ok(accumulator.finalize())
    }

    /// Get just the text content.
    pub async fn text(self) -> Result<String, Error> {
        Ok(self.collect().await?.content())
    }
}

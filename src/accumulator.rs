//! Chunk accumulation for streamed replies.

use crate::response::CompleteReply;
use crate::types::{FinishReason, StreamEvent, Usage};

/// Collects streamed deltas into a complete reply, keeping every chunk.
#[derive(Debug, Default)]
pub struct ReplyAccumulator {
    /// Text chunks in arrival order.
    chunks: Vec<String>,
    /// Final finish reason (if received).
    finish_reason: Option<FinishReason>,
    /// Final usage statistics (if received).
    usage: Option<Usage>,
}

impl ReplyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a stream event and update the accumulation.
    pub fn process_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::ContentDelta { delta } => self.chunks.push(delta),
            StreamEvent::Done {
                finish_reason,
                usage,
            } => {
                self.finish_reason = Some(finish_reason);
                self.usage = Some(usage);
            }
        }
    }

    /// Whether a `Done` event has been seen.
    pub fn is_done(&self) -> bool {
        self.finish_reason.is_some()
    }

    /// Get the text accumulated so far.
    pub fn current_content(&self) -> String {
        self.chunks.concat()
    }

    pub fn finalize(self) -> CompleteReply {
        CompleteReply {
            chunks: self.chunks,
            finish_reason: self.finish_reason.unwrap_or(FinishReason::Stop),
            usage: self.usage.unwrap_or_default(),
        }
    }
}

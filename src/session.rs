//! The long-lived chat session shared by every submission.

use std::sync::Arc;

use futures_util::StreamExt;
use uuid::Uuid;

use crate::accumulator::ReplyAccumulator;
use crate::provider::ChatProvider;
use crate::response::{CompleteReply, EventStream};
use crate::{Error, Message, StreamEvent};

/// A conversation with one model, reused across questions.
///
/// The model-side history only grows once a reply has been streamed to the
/// end, so a failed or abandoned exchange is never replayed to the model.
pub struct ChatSession {
    id: Uuid,
    provider: Arc<dyn ChatProvider>,
    history: Vec<Message>,
}

impl ChatSession {
    /// Start a session with an empty history.
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        let id = Uuid::new_v4();
        tracing::info!(session = %id, provider = provider.name(), "Chat session started");
        Self {
            id,
            provider,
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Turns the model has seen and answered, oldest first.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Send `question` with the current history and start streaming the reply.
    pub async fn send_message(&mut self, question: &str) -> Result<ReplyStream<'_>, Error> {
        let mut turns = self.history.clone();
        turns.push(Message::user(question));

        tracing::debug!(session = %self.id, turns = turns.len(), "Sending message");
        let events = self.provider.stream_chat(&turns).await?.stream();

        Ok(ReplyStream {
            session: self,
            question: question.to_string(),
            events,
            accumulator: ReplyAccumulator::new(),
            state: ReplyState::Streaming,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyState {
    Streaming,
    Complete,
    Failed,
}

/// A reply being streamed back from the model.
pub struct ReplyStream<'a> {
    session: &'a mut ChatSession,
    question: String,
    events: EventStream,
    accumulator: ReplyAccumulator,
    state: ReplyState,
}

impl ReplyStream<'_> {
    /// Next text chunk. `None` once the reply has ended or failed.
    pub async fn next_chunk(&mut self) -> Option<Result<String, Error>> {
        if self.state != ReplyState::Streaming {
            return None;
        }

        match self.events.next().await {
            Some(Ok(StreamEvent::ContentDelta { delta })) => {
                self.accumulator.process_event(StreamEvent::ContentDelta {
                    delta: delta.clone(),
                });
                Some(Ok(delta))
            }
            Some(Ok(done @ StreamEvent::Done { .. })) => {
                self.accumulator.process_event(done);
                self.complete();
                None
            }
            Some(Err(e)) => {
                tracing::warn!(session = %self.session.id, "Reply stream failed: {e}");
                self.state = ReplyState::Failed;
                Some(Err(e))
            }
            None => {
                self.complete();
                None
            }
        }
    }

    /// Drain the remaining chunks and return the whole reply.
    pub async fn finish(mut self) -> Result<CompleteReply, Error> {
        while let Some(chunk) = self.next_chunk().await {
            chunk?;
        }
        if self.state == ReplyState::Failed {
            return Err(Error::streaming("reply stream already failed"));
        }
        Ok(std::mem::take(&mut self.accumulator).finalize())
    }

    pub fn is_complete(&self) -> bool {
        self.state == ReplyState::Complete
    }

    /// Text received so far.
    pub fn current_content(&self) -> String {
        self.accumulator.current_content()
    }

    fn complete(&mut self) {
        self.state = ReplyState::Complete;
        let reply = self.accumulator.current_content();
        if reply.is_empty() {
            tracing::debug!(session = %self.session.id, "Empty reply, history unchanged");
            return;
        }
        self.session
            .history
            .push(Message::user(std::mem::take(&mut self.question)));
        self.session.history.push(Message::model(reply));
        tracing::debug!(
            session = %self.session.id,
            history = self.session.history.len(),
            "Reply recorded"
        );
    }
}

use crate::{Error, Message, Response};

/// A hosted chat model that can stream a reply to a conversation.
///
/// `history` is the whole conversation so far, ending with the new user turn.
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync + 'static {
    /// Start a streamed generation. Errors here mean nothing was received.
    async fn stream_chat(&self, history: &[Message]) -> Result<Response, Error>;

    /// Short name used in logs and error messages.
    fn name(&self) -> &str;
}

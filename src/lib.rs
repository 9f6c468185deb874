//! A small web chat front-end for Google Gemini.
//!
//! One [`ChatSession`] is opened at startup and reused for every question asked
//! from the page. Replies are streamed, and each streamed chunk becomes its own
//! entry in the [`Transcript`].

pub mod accumulator;
pub mod config;
pub mod error;
pub mod gemini;
pub mod provider;
pub mod response;
pub mod session;
pub mod sse_stream;
pub mod transcript;
pub mod types;
pub mod ui;

pub use config::AppConfig;
pub use error::Error;
pub use gemini::GeminiClient;
pub use provider::ChatProvider;
pub use response::{CompleteReply, Response};
pub use session::{ChatSession, ReplyStream};
pub use sse_stream::SseEvent;
pub use transcript::{Entry, Speaker, Transcript};
pub use types::*;

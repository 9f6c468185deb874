//! HTTP routes for the chat page.

use std::sync::Arc;

use axum::{
    extract::{Form, State},
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use super::page::{render_page, PageView};
use crate::session::ChatSession;
use crate::transcript::Transcript;

pub const WARNING_NO_RESPONSE: &str = "Failed to receive a response from Gemini.";

/// The single conversation behind the page.
pub struct ChatState {
    pub session: ChatSession,
    pub transcript: Transcript,
}

impl ChatState {
    pub fn new(session: ChatSession) -> Self {
        Self {
            session,
            transcript: Transcript::new(),
        }
    }
}

/// Shared server state.
pub struct ServerState {
    pub title: String,
    pub header: String,
    pub chat: Mutex<ChatState>,
}

pub type AppState = Arc<ServerState>;

impl ServerState {
    pub fn new(title: impl Into<String>, header: impl Into<String>, session: ChatSession) -> AppState {
        Arc::new(Self {
            title: title.into(),
            header: header.into(),
            chat: Mutex::new(ChatState::new(session)),
        })
    }
}

/// Outcome of one press of the ask button.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Submission {
    /// Chunks streamed back for this question.
    pub response: Option<Vec<String>>,
    pub error: Option<String>,
    pub warning: Option<String>,
}

/// Send a question and append the exchange to the transcript as it streams.
///
/// Blank questions are ignored. When the send itself fails the transcript is
/// left untouched; when the stream breaks part-way, the chunks already shown
/// stay in the transcript.
pub async fn submit_question(chat: &mut ChatState, question: &str) -> Submission {
    if question.trim().is_empty() {
        return Submission::default();
    }

    let ChatState {
        session,
        transcript,
    } = chat;
    let session_id = session.id();

    let mut reply = match session.send_message(question).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(
                session = %session_id,
                "Error getting response from Gemini: {e}"
            );
            return Submission {
                response: None,
                error: Some(format!("Error getting response from Gemini: {e}")),
                warning: Some(WARNING_NO_RESPONSE.to_string()),
            };
        }
    };

    transcript.push_question(question);
    let mut chunks = Vec::new();
    let mut error = None;

    while let Some(chunk) = reply.next_chunk().await {
        match chunk {
            Ok(chunk) => {
                transcript.push_chunk(chunk.clone());
                chunks.push(chunk);
            }
            Err(e) => {
                error = Some(format!("Error getting response from Gemini: {e}"));
                break;
            }
        }
    }

    tracing::info!(
        session = %session_id,
        chunks = chunks.len(),
        transcript = transcript.len(),
        failed = error.is_some(),
        "Question answered"
    );

    let warning = error.as_ref().map(|_| WARNING_NO_RESPONSE.to_string());
    Submission {
        response: Some(chunks),
        error,
        warning,
    }
}

#[derive(Debug, Deserialize)]
pub struct AskForm {
    #[serde(default)]
    pub input: String,
}

/// Create the router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(show_page).post(ask))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn show_page(State(state): State<AppState>) -> Html<String> {
    let chat = state.chat.lock().await;
    Html(render_page(&PageView::idle(
        &state.title,
        &state.header,
        &chat.transcript,
    )))
}

async fn ask(State(state): State<AppState>, Form(form): Form<AskForm>) -> Html<String> {
    let mut chat = state.chat.lock().await;
    let submission = submit_question(&mut chat, &form.input).await;

    Html(render_page(&PageView {
        title: &state.title,
        header: &state.header,
        input: &form.input,
        error: submission.error.as_deref(),
        warning: submission.warning.as_deref(),
        response: submission.response.as_deref(),
        transcript: &chat.transcript,
    }))
}

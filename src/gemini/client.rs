use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::types::*;
use crate::config::{AppConfig, DEFAULT_BASE_URL};
use crate::provider::ChatProvider;
use crate::sse_stream::SseStreamExt;
use crate::types::{FinishReason, Message};
use crate::{Error, Response, StreamEvent};

const PROVIDER: &str = "Gemini";

/// Client for the Gemini `generateContent` API, authenticated with an API key.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    generation_config: GenerationConfig,
}

impl GeminiClient {
    /// Create a client for `model` against the public endpoint.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, Error> {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL, Duration::from_secs(60))
    }

    /// Create a client with a custom API root (used by tests against a mock server).
    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::config("Gemini API key must not be empty"));
        }
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            generation_config: GenerationConfig::default(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let client = Self::with_base_url(
            config.api_key.clone(),
            config.model.clone(),
            config.base_url.clone(),
            config.request_timeout,
        )?;
        Ok(client.with_generation_config(config.generation.clone()))
    }

    pub fn with_generation_config(mut self, generation_config: GenerationConfig) -> Self {
        self.generation_config = generation_config;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }

    /// Build the request body from the conversation.
    fn build_request(&self, history: &[Message]) -> GeminiRequest {
        let contents = history
            .iter()
            .map(|msg| GeminiContent {
                role: Some(msg.role.as_str().to_string()),
                parts: vec![GeminiPart::text(msg.content.clone())],
            })
            .collect();

        let generation_config = if self.generation_config.is_empty() {
            None
        } else {
            Some(self.generation_config.clone())
        };

        GeminiRequest {
            contents,
            generation_config,
        }
    }

    /// Turn a non-success body into a readable message.
    fn describe_failure(status: StatusCode, body: &str) -> String {
        match serde_json::from_str::<GeminiErrorBody>(body) {
            Ok(parsed) => format!("API error ({}): {}", status.as_u16(), parsed.error.message),
            Err(_) if body.trim().is_empty() => format!("API error ({})", status.as_u16()),
            Err(_) => format!("API error ({}): {}", status.as_u16(), body.trim()),
        }
    }

    /// Convert one streamed chunk into events.
    fn convert_chunk(response: GeminiResponse) -> Result<Vec<StreamEvent>, Error> {
        let mut events = Vec::new();

        let Some(candidate) = response.candidates.into_iter().next() else {
            if let Some(reason) = response
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
            {
                return Err(Error::blocked(reason));
            }
            if let Some(meta) = response.usage_metadata {
                events.push(StreamEvent::Done {
                    finish_reason: FinishReason::Stop,
                    usage: meta.into(),
                });
            }
            return Ok(events);
        };

        let texts = candidate
            .content
            .into_iter()
            .flat_map(|content| content.parts)
            .filter_map(|part| part.text)
            .filter(|text| !text.is_empty());
        for delta in texts {
            events.push(StreamEvent::ContentDelta { delta });
        }

        if let Some(reason) = candidate.finish_reason {
            events.push(StreamEvent::Done {
                finish_reason: FinishReason::from_gemini(&reason),
                usage: response.usage_metadata.map(Into::into).unwrap_or_default(),
            });
        }

        Ok(events)
    }
}

#[async_trait::async_trait]
impl ChatProvider for GeminiClient {
    async fn stream_chat(&self, history: &[Message]) -> Result<Response, Error> {
        let request = self.build_request(history);
        tracing::debug!(
            model = %self.model,
            turns = request.contents.len(),
            "Sending streamGenerateContent request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = Self::describe_failure(status, &body);
            tracing::warn!(%status, "Gemini request failed: {message}");
            return Err(Error::provider(PROVIDER, message));
        }

        let events = response
            .bytes_stream()
            .sse_events()
            .map(|frame| -> Vec<Result<StreamEvent, Error>> {
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(e) => return vec![Err(e)],
                };
                if frame.is_empty_or_done() {
                    return Vec::new();
                }
                let parsed = serde_json::from_str::<GeminiResponse>(frame.data.trim())
                    .map_err(|e| {
                        Error::provider(PROVIDER, format!("Failed to parse SSE event: {e}"))
                    })
                    .and_then(Self::convert_chunk);
                match parsed {
                    Ok(events) => events.into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(e)],
                }
            })
            .flat_map(futures_util::stream::iter);

        Ok(Response::from_stream(events))
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

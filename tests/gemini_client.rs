use futures_util::StreamExt;
use qachat::{ChatProvider, Error, FinishReason, GeminiClient, Message, StreamEvent};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STREAM_PATH: &str = "/v1beta/models/gemini-pro:streamGenerateContent";

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::with_base_url("test-api-key", "gemini-pro", server.uri(), Duration::from_secs(5))
        .expect("Failed to create Gemini client")
}

fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/event-stream")
        .insert_header("cache-control", "no-cache")
}

#[tokio::test]
async fn test_streamed_reply_arrives_in_chunks() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", "test-api-key"))
        .and(body_json(json!({
            "contents": [
                {"role": "user", "parts": [{"text": "I can't focus lately"}]}
            ]
        })))
        .respond_with(sse(include_str!("fixtures/gemini/reply.sse")))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .stream_chat(&[Message::user("I can't focus lately")])
        .await
        .expect("request should succeed");

    let mut deltas = Vec::new();
    let mut done = None;
    let mut stream = response.stream();
    while let Some(event) = stream.next().await {
        match event.expect("stream should decode") {
            StreamEvent::ContentDelta { delta } => deltas.push(delta),
            StreamEvent::Done {
                finish_reason,
                usage,
            } => done = Some((finish_reason, usage)),
        }
    }

    assert_eq!(
        deltas,
        vec![
            "Talking to someone you trust",
            " can help.",
            " So can a short walk."
        ]
    );
    let (finish_reason, usage) = done.expect("stream should finish");
    assert_eq!(finish_reason, FinishReason::Stop);
    assert_eq!(usage.input_tokens, 9);
    assert_eq!(usage.output_tokens, 14);
}

#[tokio::test]
async fn test_history_is_sent_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(body_json(json!({
            "contents": [
                {"role": "user", "parts": [{"text": "Hello"}]},
                {"role": "model", "parts": [{"text": "Hi! How are you feeling?"}]},
                {"role": "user", "parts": [{"text": "Tired"}]}
            ]
        })))
        .respond_with(sse(include_str!("fixtures/gemini/reply.sse")))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server)
        .stream_chat(&[
            Message::user("Hello"),
            Message::model("Hi! How are you feeling?"),
            Message::user("Tired"),
        ])
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(text, "Talking to someone you trust can help. So can a short walk.");
}

#[tokio::test]
async fn test_api_error_is_reported_before_streaming() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT"
            }
        })))
        .mount(&server)
        .await;

    let result = client(&server).stream_chat(&[Message::user("hi")]).await;
    let err = match result {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    };

    match &err {
        Error::Provider { provider, message } => {
            assert_eq!(provider, "Gemini");
            assert_eq!(
                message,
                "API error (400): API key not valid. Please pass a valid API key."
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_chunk_fails_the_stream() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(sse(include_str!("fixtures/gemini/broken.sse")))
        .mount(&server)
        .await;

    let response = client(&server)
        .stream_chat(&[Message::user("hi")])
        .await
        .unwrap();
    let mut stream = response.stream();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(
        first,
        StreamEvent::ContentDelta {
            delta: "Here is a start".to_string()
        }
    );

    let second = stream.next().await.unwrap();
    assert!(matches!(second, Err(Error::Provider { .. })));
}

#[tokio::test]
async fn test_blocked_prompt_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(sse(
            "data: {\"promptFeedback\": {\"blockReason\": \"SAFETY\"}}\n\n",
        ))
        .mount(&server)
        .await;

    let err = client(&server)
        .stream_chat(&[Message::user("hi")])
        .await
        .unwrap()
        .text()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Blocked(ref reason) if reason == "SAFETY"));
}

#[tokio::test]
async fn test_unreachable_server_is_http_error() {
    // Nothing listens on the discard port.
    let client = GeminiClient::with_base_url(
        "test-api-key",
        "gemini-pro",
        "http://127.0.0.1:9",
        Duration::from_secs(2),
    )
    .unwrap();

    let result = client.stream_chat(&[Message::user("hi")]).await;
    tokio_test::assert_err!(result.map(|_| ()));
}

use serde_json::json;
use std::time::{Duration, Instant};
use story_engine::*;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STORY_JSON: &str = r#"{"title": "Finn und der Mond", "blocks": [
    {"type": "text", "content": "Finn konnte nicht schlafen."},
    {"type": "image_prompt", "content": "a small fox in blue pajamas, night"},
    {"type": "text", "content": "Der Mond lachte."},
    {"type": "image_prompt", "content": "a small fox in blue pajamas, talking to the moon"}
]}"#;

/// Encode `text` as Ollama NDJSON, `per_line` characters at a time.
fn ndjson(text: &str, per_line: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::new();
    for piece in chars.chunks(per_line) {
        let token: String = piece.iter().collect();
        out.push_str(&json!({"model": "llama3.1", "response": token, "done": false}).to_string());
        out.push('\n');
    }
    out.push_str(&json!({"model": "llama3.1", "response": "", "done": true}).to_string());
    out.push('\n');
    out
}

fn client_for(server: &MockServer) -> OllamaClient {
    OllamaClient::new(server.uri(), "llama3.1")
        .with_config(LlmConfig::default().with_unload_cooldown(Duration::ZERO))
}

#[tokio::test]
async fn streams_and_parses_story() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "llama3.1",
            "prompt": "Write a complete story about: Finn and the moon",
            "stream": true,
            "format": "json",
            "options": {"temperature": 0.7, "num_ctx": 8192}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson(STORY_JSON, 7)))
        .expect(1)
        .mount(&server)
        .await;

    let mut streamed = String::new();
    let output = client_for(&server)
        .generate_story_streaming("Finn and the moon", |t| streamed.push_str(t))
        .await
        .unwrap();

    assert_eq!(streamed, STORY_JSON);
    assert_eq!(output.raw_response, STORY_JSON);
    assert_eq!(output.story.title, "Finn und der Mond");

    let scenes = output.story.scenes();
    assert_eq!(scenes.len(), 2);
    assert_eq!(scenes[1].number, 2);
    assert_eq!(scenes[1].text, "Der Mond lachte.");
}

#[tokio::test]
async fn stops_reading_at_done() {
    let server = MockServer::start().await;
    let mut body = ndjson(r#"{"title": "T", "blocks": []}"#, 5);
    body.push_str(&json!({"response": "trailing garbage", "done": false}).to_string());
    body.push('\n');
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let story = client_for(&server).generate_story("t").await.unwrap();
    assert_eq!(story.title, "T");
    assert!(story.blocks.is_empty());
}

#[tokio::test]
async fn strips_reasoning_block() {
    let server = MockServer::start().await;
    let text = format!("<think>eight scenes, a fox</think>{}", STORY_JSON);
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson(&text, 16)))
        .mount(&server)
        .await;

    let output = client_for(&server)
        .generate_story_streaming("fox", |_| {})
        .await
        .unwrap();
    assert_eq!(output.thinking.as_deref(), Some("eight scenes, a fox"));
    assert_eq!(output.story.blocks.len(), 4);
}

#[tokio::test]
async fn invalid_story_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson("Once upon a time...", 4)))
        .mount(&server)
        .await;

    let err = client_for(&server).generate_story("t").await.unwrap_err();
    assert!(matches!(err, StoryError::InvalidStory(_)));
}

#[tokio::test]
async fn service_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"error":"model 'llama3.1' not found"}"#))
        .mount(&server)
        .await;

    match client_for(&server).generate_story("t").await.unwrap_err() {
        StoryError::Service { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("not found"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unreachable_endpoint() {
    let err = OllamaClient::new("http://127.0.0.1:1", "llama3.1")
        .generate_story("t")
        .await
        .unwrap_err();
    assert!(matches!(err, StoryError::Unreachable { .. }));
}

#[tokio::test]
async fn unload_sends_keep_alive_zero() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"model": "llama3.1", "prompt": "", "keep_alive": 0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true, "done_reason": "unload"})))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server).unload_model().await.unwrap();
}

#[tokio::test]
async fn unload_waits_for_cooldown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
        .mount(&server)
        .await;

    let client = OllamaClient::new(server.uri(), "llama3.1")
        .with_config(LlmConfig::default().with_unload_cooldown(Duration::from_millis(150)));
    let started = Instant::now();
    client.unload_model().await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn unload_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client_for(&server).unload_model().await.unwrap_err();
    assert!(matches!(err, StoryError::Service { status: 500, .. }));
}

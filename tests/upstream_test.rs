//! Provider adapters against a local stand-in for the upstream API.

mod common;

use axum::{
    http::{ HeaderMap, StatusCode },
    routing::post,
    Json,
    Router,
};
use chatbot_relay::llm::chat::groq::GroqChatClient;
use chatbot_relay::llm::chat::ollama::OllamaClient;
use chatbot_relay::llm::chat::openai::OpenAIChatClient;
use chatbot_relay::llm::chat::{ ChatClient, UpstreamError };
use chatbot_relay::llm::GenerationParams;
use chatbot_relay::models::chat::{ ChatRequest, ChatRole, ChatTurn };
use common::spawn_server;
use serde_json::{ json, Value };
use std::sync::{ Arc, Mutex };
use std::time::Duration;

fn request() -> ChatRequest {
    ChatRequest {
        messages: vec![
            ChatTurn::new(ChatRole::System, "Be brief"),
            ChatTurn::new(ChatRole::User, "Hi")
        ],
        model: "llama-3.1-8b-instant".to_string(),
    }
}

fn groq_at(base: &str, timeout: Duration) -> GroqChatClient {
    GroqChatClient::new(
        "test-key".to_string(),
        Some(format!("{}/openai/v1", base)),
        GenerationParams::default(),
        timeout
    ).unwrap()
}

/// Upstream that always answers with `status` and `body`.
async fn fixed_upstream(status: StatusCode, body: Value) -> String {
    let app = Router::new().route(
        "/openai/v1/chat/completions",
        post(move || {
            let body = body.clone();
            async move { (status, Json(body)) }
        })
    );
    spawn_server(app).await
}

#[tokio::test]
async fn groq_sends_openai_payload_and_maps_reply() {
    let seen: Arc<Mutex<Option<(HeaderMap, Value)>>> = Arc::new(Mutex::new(None));
    let captured = seen.clone();
    let app = Router::new().route(
        "/openai/v1/chat/completions",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let captured = captured.clone();
            async move {
                *captured.lock().unwrap() = Some((headers, body));
                Json(
                    json!({
                    "id": "chatcmpl-123",
                    "model": "llama-3.1-8b-instant",
                    "choices": [{ "index": 0, "message": { "role": "assistant", "content": "Hello!" } }],
                    "usage": { "prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5 }
                })
                )
            }
        })
    );
    let base = spawn_server(app).await;

    let completion = groq_at(&base, Duration::from_secs(5)).complete(&request()).await.unwrap();
    assert_eq!(completion.text, "Hello!");
    assert_eq!(completion.model_used, "llama-3.1-8b-instant");
    assert_eq!(completion.token_count, 5);
    assert_eq!(completion.completion_id, "chatcmpl-123");

    let (headers, body) = seen.lock().unwrap().take().unwrap();
    assert_eq!(headers["authorization"], "Bearer test-key");
    assert_eq!(body["model"], "llama-3.1-8b-instant");
    assert_eq!(body["max_tokens"], 1024);
    assert_eq!(body["top_p"], 1.0);
    assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    assert_eq!(
        body["messages"],
        json!([
            { "role": "system", "content": "Be brief" },
            { "role": "user", "content": "Hi" }
        ])
    );
}

#[tokio::test]
async fn missing_usage_counts_zero_tokens() {
    let base = fixed_upstream(
        StatusCode::OK,
        json!({ "id": "x1", "choices": [{ "message": { "content": "ok" } }] })
    ).await;

    let completion = groq_at(&base, Duration::from_secs(5)).complete(&request()).await.unwrap();
    assert_eq!(completion.token_count, 0);
    assert_eq!(completion.model_used, "llama-3.1-8b-instant");
}

#[tokio::test]
async fn upstream_statuses_are_categorized() {
    let base = fixed_upstream(StatusCode::UNAUTHORIZED, json!({ "error": { "message": "bad key" } })).await;
    let err = groq_at(&base, Duration::from_secs(5)).complete(&request()).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Unauthorized), "got {:?}", err);

    let base = fixed_upstream(StatusCode::TOO_MANY_REQUESTS, json!({})).await;
    let err = groq_at(&base, Duration::from_secs(5)).complete(&request()).await.unwrap_err();
    assert!(matches!(err, UpstreamError::RateLimited), "got {:?}", err);

    let base = fixed_upstream(StatusCode::BAD_GATEWAY, json!({ "error": "overloaded" })).await;
    let err = groq_at(&base, Duration::from_secs(5)).complete(&request()).await.unwrap_err();
    match err {
        UpstreamError::Status { status, body } => {
            assert_eq!(status, 502);
            assert!(body.contains("overloaded"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn garbage_body_is_a_decode_error() {
    let base = fixed_upstream(StatusCode::OK, json!({ "unexpected": true })).await;
    let err = groq_at(&base, Duration::from_secs(5)).complete(&request()).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Decode(_)), "got {:?}", err);
}

#[tokio::test]
async fn closed_port_is_unreachable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = groq_at(&format!("http://{}", addr), Duration::from_secs(5))
        .complete(&request()).await
        .unwrap_err();
    assert!(matches!(err, UpstreamError::Unreachable(_)), "got {:?}", err);
}

#[tokio::test]
async fn slow_upstream_is_a_timeout() {
    let app = Router::new().route(
        "/openai/v1/chat/completions",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({ "id": "late", "choices": [] }))
        })
    );
    let base = spawn_server(app).await;

    let err = groq_at(&base, Duration::from_millis(100)).complete(&request()).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Timeout(_)), "got {:?}", err);
}

#[tokio::test]
async fn openai_accepts_versioned_base_url() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            Json(
                json!({
                "id": "oa-1",
                "model": "gpt-4o-mini",
                "choices": [{ "message": { "content": "hey" } }],
                "usage": { "total_tokens": 9 }
            })
            )
        })
    );
    let base = spawn_server(app).await;

    let client = OpenAIChatClient::new(
        "sk-test".to_string(),
        Some(format!("{}/v1", base)),
        GenerationParams::default(),
        Duration::from_secs(5)
    ).unwrap();
    let completion = client.complete(&request()).await.unwrap();
    assert_eq!(completion.model_used, "gpt-4o-mini");
    assert_eq!(completion.token_count, 9);
}

#[tokio::test]
async fn ollama_native_chat_is_mapped() {
    let app = Router::new().route(
        "/api/chat",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["stream"], false);
            assert_eq!(body["options"]["num_predict"], 1024);
            Json(
                json!({
                "model": "llama3",
                "message": { "role": "assistant", "content": "local hello" },
                "done": true,
                "prompt_eval_count": 7,
                "eval_count": 4
            })
            )
        })
    );
    let base = spawn_server(app).await;

    let client = OllamaClient::new(Some(base), GenerationParams::default(), Duration::from_secs(5)).unwrap();
    let completion = client.complete(&request()).await.unwrap();
    assert_eq!(completion.text, "local hello");
    assert_eq!(completion.model_used, "llama3");
    assert_eq!(completion.token_count, 11);
    assert!(completion.completion_id.starts_with("ollama-"));
}

#[tokio::test]
async fn connection_dropped_mid_body_is_unreachable() {
    use chatbot_relay::error::RelayError;
    use tokio::io::{ AsyncReadExt, AsyncWriteExt };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let _ = socket.read(&mut buf).await;
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 5000\r\n\r\n{\"id\":"
            ).await
            .unwrap();
        socket.shutdown().await.ok();
    });

    let err = groq_at(&format!("http://{}", addr), Duration::from_secs(5))
        .complete(&request()).await
        .unwrap_err();
    assert!(matches!(err, UpstreamError::Unreachable(_)), "got {:?}", err);
    assert_eq!(RelayError::from(err).code(), "SERVICE_UNAVAILABLE");
}

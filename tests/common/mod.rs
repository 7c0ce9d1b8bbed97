#![allow(dead_code)]

use async_trait::async_trait;
use axum::{ body::Body, extract::ConnectInfo, http::{ header::CONTENT_TYPE, Request }, Router };
use chatbot_relay::llm::chat::{ ChatClient, Completion, UpstreamError };
use chatbot_relay::llm::LlmType;
use chatbot_relay::models::chat::ChatRequest;
use chatbot_relay::rate_limit::{ RateLimitConfig, SlidingWindowLimiter };
use chatbot_relay::server::{ build_router, AppState, HttpOptions };
use std::net::SocketAddr;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::{ Arc, Mutex };
use std::time::Duration;

type Responder = Box<dyn Fn(&ChatRequest) -> Result<Completion, UpstreamError> + Send + Sync>;

pub struct MockChatClient {
    respond: Responder,
    delay: Duration,
    calls: AtomicUsize,
    last_request: Mutex<Option<ChatRequest>>,
}

impl MockChatClient {
    pub fn new(
        respond: impl Fn(&ChatRequest) -> Result<Completion, UpstreamError> + Send + Sync + 'static
    ) -> Self {
        Self {
            respond: Box::new(respond),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Always answers `text`, echoing the requested model.
    pub fn replying(text: &'static str) -> Self {
        Self::new(move |req| {
            Ok(Completion {
                text: text.to_string(),
                model_used: req.model.clone(),
                token_count: 5,
                completion_id: "abc".to_string(),
            })
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.respond)(request)
    }

    fn provider(&self) -> LlmType {
        LlmType::Groq
    }

    fn get_base_url(&self) -> String {
        "mock://upstream".to_string()
    }
}

pub fn state_with(client: Option<Arc<MockChatClient>>, limits: RateLimitConfig) -> AppState {
    let client = client.map(|c| c as Arc<dyn ChatClient>);
    AppState::new(client, Arc::new(SlidingWindowLimiter::new(limits)), LlmType::Groq, "default-model")
}

pub fn app(state: AppState) -> Router {
    build_router(state, &HttpOptions::default())
}

pub fn chat_request(body: &serde_json::Value, peer: &str) -> Request<Body> {
    let mut req = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap();
    req.extensions_mut().insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
    req
}

pub async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });
    format!("http://{}", addr)
}

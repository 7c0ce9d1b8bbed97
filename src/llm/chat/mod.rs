pub mod groq;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::{ LlmConfig, LlmType };
use self::groq::GroqChatClient;
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use crate::models::chat::ChatRequest;

/// What the upstream produced for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub model_used: String,
    pub token_count: u64,
    pub completion_id: String,
}

/// Categorized upstream failure. Nothing here is retried.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream rejected the credentials")]
    Unauthorized,

    #[error("upstream rate limit exceeded")]
    RateLimited,

    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),

    #[error("upstream returned HTTP {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },

    #[error("could not decode upstream response: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, UpstreamError>;

    fn provider(&self) -> LlmType;
    fn get_base_url(&self) -> String;
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Groq => {
            let specific_client = GroqChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

pub(crate) fn build_http_client(
    api_key: Option<&str>,
    timeout: Duration
) -> Result<reqwest::Client, Box<dyn StdError + Send + Sync>> {
    use reqwest::header::{ HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE };

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = api_key {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| format!("Invalid API key format: {}", e))?
        );
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)
}

pub(crate) fn classify_transport_error(err: reqwest::Error, timeout: Duration) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout(timeout)
    } else if err.is_connect() || err.is_request() || err.is_body() {
        UpstreamError::Unreachable(err.to_string())
    } else if err.is_decode() {
        UpstreamError::Decode(err.to_string())
    } else {
        UpstreamError::Other(err.to_string())
    }
}

pub(crate) fn classify_status(status: StatusCode, body: String) -> UpstreamError {
    match status {
        StatusCode::UNAUTHORIZED => UpstreamError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => UpstreamError::RateLimited,
        other => UpstreamError::Status { status: other.as_u16(), body },
    }
}

/// Sends `payload`; anything other than a 2xx comes back as a categorized failure.
pub(crate) async fn post_json<T: serde::Serialize + ?Sized>(
    http: &reqwest::Client,
    url: &str,
    payload: &T,
    timeout: Duration
) -> Result<reqwest::Response, UpstreamError> {
    let resp = http
        .post(url)
        .json(payload)
        .send()
        .await
        .map_err(|e| classify_transport_error(e, timeout))?;

    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(classify_status(status, body))
}

/// Reads the whole body before parsing, so a connection dropped mid-body is a
/// transport failure rather than a decode failure.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
    timeout: Duration
) -> Result<T, UpstreamError> {
    let bytes = resp.bytes().await.map_err(|e| classify_transport_error(e, timeout))?;
    serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode(e.to_string()))
}

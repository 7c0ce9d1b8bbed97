use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;
use std::time::Duration;

use super::{ post_json, read_json, build_http_client, ChatClient, Completion, UpstreamError };
use crate::llm::{ GenerationParams, LlmConfig, LlmType };
use crate::models::chat::{ ChatRequest, ChatTurn };

/// Wire format shared by every OpenAI-compatible completion endpoint.
#[derive(Serialize)]
pub(super) struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatTurn],
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub stream: bool,
}

impl<'a> ChatCompletionRequest<'a> {
    pub fn new(request: &'a ChatRequest, params: &GenerationParams) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_p: params.top_p,
            stream: false,
        }
    }
}

#[derive(Deserialize)]
pub(super) struct ChatCompletionResponse {
    pub id: String,
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    pub usage: Option<ChatCompletionUsage>,
}

#[derive(Deserialize)]
pub(super) struct ChatCompletionChoice {
    pub message: ChatCompletionMessage,
}

#[derive(Deserialize)]
pub(super) struct ChatCompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct ChatCompletionUsage {
    #[serde(default)]
    pub total_tokens: u64,
}

impl ChatCompletionResponse {
    pub fn into_completion(self, requested_model: &str) -> Result<Completion, UpstreamError> {
        let text = self.choices
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::Decode("response contained no choices".to_string()))?
            .message.content
            .unwrap_or_default();

        Ok(Completion {
            text,
            model_used: self.model.unwrap_or_else(|| requested_model.to_string()),
            token_count: self.usage.map(|u| u.total_tokens).unwrap_or(0),
            completion_id: self.id,
        })
    }
}

pub(super) async fn create_chat_completion(
    http: &HttpClient,
    url: &str,
    request: &ChatRequest,
    params: &GenerationParams,
    timeout: Duration
) -> Result<Completion, UpstreamError> {
    let payload = ChatCompletionRequest::new(request, params);
    debug!("POST {} model={} turns={}", url, request.model, request.messages.len());

    let resp = post_json(http, url, &payload, timeout).await?;
    let body: ChatCompletionResponse = read_json(resp, timeout).await?;

    body.into_completion(&request.model)
}

pub struct OpenAIChatClient {
    http: HttpClient,
    base_url: String,
    params: GenerationParams,
    timeout: Duration,
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        params: GenerationParams,
        timeout: Duration,
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let api_url = base_url.unwrap_or_else(|| "https://api.openai.com".to_string());
        let http = build_http_client(Some(&api_key), timeout)?;

        Ok(Self {
            http,
            base_url: api_url,
            params,
            timeout,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| "OpenAI API key is required".to_string())?;

        Self::new(api_key, config.base_url.clone(), config.params, config.request_timeout)
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, UpstreamError> {
        create_chat_completion(&self.http, &self.endpoint(), request, &self.params, self.timeout).await
    }

    fn provider(&self) -> LlmType {
        LlmType::OpenAI
    }

    fn get_base_url(&self) -> String {
        self.base_url.clone()
    }
}

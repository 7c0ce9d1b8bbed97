use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::error::Error as StdError;
use std::time::Duration;

use super::openai::create_chat_completion;
use super::{ build_http_client, ChatClient, Completion, UpstreamError };
use crate::llm::{ GenerationParams, LlmConfig, LlmType };
use crate::models::chat::ChatRequest;

pub const GROQ_DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

pub struct GroqChatClient {
    http: HttpClient,
    base_url: String,
    params: GenerationParams,
    timeout: Duration,
}

impl GroqChatClient {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        params: GenerationParams,
        timeout: Duration,
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let api_url = base_url.unwrap_or_else(|| GROQ_DEFAULT_BASE_URL.to_string());
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
            .ok_or_else(|| "Groq API key is required".to_string())?;

        Self::new(api_key, config.base_url.clone(), config.params, config.request_timeout)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatClient for GroqChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, UpstreamError> {
        create_chat_completion(&self.http, &self.endpoint(), request, &self.params, self.timeout).await
    }

    fn provider(&self) -> LlmType {
        LlmType::Groq
    }

    fn get_base_url(&self) -> String {
        self.base_url.clone()
    }
}

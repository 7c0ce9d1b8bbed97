use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;
use std::time::Duration;
use uuid::Uuid;

use super::{ post_json, read_json, build_http_client, ChatClient, Completion, UpstreamError };
use crate::llm::{ GenerationParams, LlmConfig, LlmType };
use crate::models::chat::{ ChatRequest, ChatTurn };

/// Talks to a local Ollama daemon through its native `/api/chat` route.
#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    params: GenerationParams,
    timeout: Duration,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    model: Option<String>,
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

impl OllamaChatResponse {
    fn into_completion(self, requested_model: &str) -> Completion {
        Completion {
            text: self.message.content,
            model_used: self.model.unwrap_or_else(|| requested_model.to_string()),
            token_count: self.prompt_eval_count + self.eval_count,
            completion_id: format!("ollama-{}", Uuid::new_v4()),
        }
    }
}

impl OllamaClient {
    pub fn new(
        base_url: Option<String>,
        params: GenerationParams,
        timeout: Duration
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let url = base_url.unwrap_or_else(|| "http://localhost:11434".into());

        Ok(Self {
            http: build_http_client(None, timeout)?,
            base_url: url,
            params,
            timeout,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        if config.llm_type != LlmType::Ollama {
            return Err("Invalid config type for OllamaClient".into());
        }

        Self::new(config.base_url.clone(), config.params, config.request_timeout)
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, UpstreamError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let payload = OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            options: OllamaOptions {
                temperature: self.params.temperature,
                top_p: self.params.top_p,
                num_predict: self.params.max_tokens,
            },
        };
        debug!("POST {} model={} turns={}", url, request.model, request.messages.len());

        let resp = post_json(&self.http, &url, &payload, self.timeout).await?;
        let body: OllamaChatResponse = read_json(resp, self.timeout).await?;

        Ok(body.into_completion(&request.model))
    }

    fn provider(&self) -> LlmType {
        LlmType::Ollama
    }

    fn get_base_url(&self) -> String {
        self.base_url.clone()
    }
}

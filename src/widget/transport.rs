use async_trait::async_trait;
use log::{ info, warn };
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::time::Duration;
use thiserror::Error;

use crate::models::chat::{ ChatMessage, ChatReply };

#[derive(Debug, Error)]
pub enum TransportError {
    /// The relay answered with a structured error body.
    #[error("{message}")]
    Relay {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("{0}")]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn send(&self, messages: &[ChatMessage], model: &str) -> Result<ChatReply, TransportError>;
}

#[derive(Serialize)]
struct OutgoingChat<'a> {
    messages: &'a [ChatMessage],
    model: &'a str,
}

#[derive(Deserialize)]
struct RelayErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

pub struct HttpRelayTransport {
    http: HttpClient,
    endpoint: String,
}

impl HttpRelayTransport {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = HttpClient::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(Self { http, endpoint: endpoint.into() })
    }

    /// The relay's health route, derived from the chat endpoint.
    pub fn health_url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        match base.strip_suffix("/chat") {
            Some(prefix) => format!("{}/health", prefix),
            None => format!("{}/health", base),
        }
    }

    pub async fn check_health(&self) -> bool {
        match self.http.get(self.health_url()).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("Backend connection successful");
                true
            }
            Ok(resp) => {
                warn!("Backend health check failed: HTTP {}", resp.status());
                false
            }
            Err(e) => {
                warn!("Backend connection failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl RelayTransport for HttpRelayTransport {
    async fn send(&self, messages: &[ChatMessage], model: &str) -> Result<ChatReply, TransportError> {
        let resp = self.http
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&(OutgoingChat { messages, model }))
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<ChatReply>().await?);
        }

        let body = resp.json::<RelayErrorBody>().await.ok();
        let (message, code) = match body {
            Some(RelayErrorBody { error: Some(error), code }) => (error, code),
            Some(RelayErrorBody { error: None, code }) => (format!("HTTP {}", status.as_u16()), code),
            None => (format!("HTTP {}", status.as_u16()), None),
        };
        Err(TransportError::Relay { status: status.as_u16(), code, message })
    }
}

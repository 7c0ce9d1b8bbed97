use clap::{ Parser, Subcommand };
use std::num::NonZeroU32;
use std::time::Duration;

use crate::llm::{ GenerationParams, LlmConfig, LlmType };
use crate::rate_limit::RateLimitConfig;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (groq, openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "groq")]
    pub chat_llm_type: LlmType,

    /// Base URL for the Chat LLM provider API (e.g., https://api.groq.com/openai/v1)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider. Empty means not configured.
    #[arg(long, env = "CHAT_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Model used when a request does not name one.
    #[arg(long, env = "DEFAULT_MODEL", default_value = "llama-3.1-8b-instant")]
    pub default_model: String,

    #[arg(long, env = "CHAT_TEMPERATURE", default_value = "0.7")]
    pub temperature: f32,

    #[arg(long, env = "CHAT_MAX_TOKENS", default_value = "1024")]
    pub max_tokens: u32,

    #[arg(long, env = "CHAT_TOP_P", default_value = "1.0")]
    pub top_p: f32,

    /// Upper bound on a single upstream call, in seconds.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    // --- Rate Limit Args ---
    /// Length of the per-client sliding window, in milliseconds.
    #[arg(long, env = "RATE_LIMIT_WINDOW_MS", default_value = "60000")]
    pub rate_limit_window_ms: u64,

    /// Requests a single client may make inside one window.
    #[arg(long, env = "RATE_LIMIT_MAX_REQUESTS", default_value = "10")]
    pub rate_limit_max_requests: usize,

    /// How often idle clients are dropped from the limiter, in seconds. 0 disables the sweep.
    #[arg(long, env = "RATE_LIMIT_SWEEP_SECS", default_value = "300")]
    pub rate_limit_sweep_secs: u64,

    /// Optional process-wide cap on chat requests per second, across all clients.
    #[arg(long, env = "GLOBAL_REQUESTS_PER_SECOND")]
    pub global_requests_per_second: Option<NonZeroU32>,

    /// Take the client identity from the first X-Forwarded-For entry instead of the peer address.
    #[arg(long, env = "TRUST_PROXY", default_value = "false")]
    pub trust_proxy: bool,

    // --- HTTP Server Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "0.0.0.0:3000")]
    pub server_addr: String,

    /// Comma-separated list of allowed CORS origins. Use "*" to allow any origin.
    #[arg(
        long,
        env = "CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000,http://127.0.0.1:3000,http://localhost:5500"
    )]
    pub cors_origins: Vec<String>,

    /// Largest accepted request body, in bytes.
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "10485760")]
    pub max_body_bytes: usize,

    /// Directory with the widget's static assets, served for non-API paths.
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<String>,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP relay (the default when no subcommand is given).
    Serve,
    /// Chat with a running relay from the terminal.
    Chat(ChatArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ChatArgs {
    /// Relay chat endpoint.
    #[arg(long, env = "CHAT_ENDPOINT", default_value = "http://localhost:3000/api/chat")]
    pub endpoint: String,

    /// Directory where the conversation is saved (as chatbot_conversation.json).
    #[arg(long, env = "CHAT_HISTORY_DIR", default_value = ".")]
    pub history_dir: String,

    /// Model to select on start, overriding the saved one.
    #[arg(long)]
    pub model: Option<String>,
}

impl Args {
    pub fn api_key(&self) -> Option<String> {
        Some(self.chat_api_key.trim().to_string()).filter(|k| !k.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig::new(
            Duration::from_millis(self.rate_limit_window_ms),
            self.rate_limit_max_requests
        )
    }

    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            llm_type: self.chat_llm_type,
            api_key: self.api_key(),
            base_url: self.chat_base_url.clone().filter(|u| !u.trim().is_empty()),
            params: GenerationParams {
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                top_p: self.top_p,
            },
            request_timeout: self.request_timeout(),
        }
    }
}

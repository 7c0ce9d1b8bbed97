pub mod cli;
pub mod error;
pub mod llm;
pub mod models;
pub mod rate_limit;
pub mod server;
pub mod validation;
pub mod widget;

use cli::Args;
use llm::chat::{ new_client, ChatClient };
use log::{ info, warn };
use rate_limit::{ BurstGuard, SlidingWindowLimiter };
use server::{ AppState, Server };
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let limits = args.rate_limit_config();

    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Base URL: {}", args.chat_base_url.as_deref().unwrap_or("adapter default"));
    info!("Default Model: {}", args.default_model);
    info!("API Key Configured: {}", args.api_key().is_some());
    info!("Request Timeout: {}s", args.request_timeout_secs);
    info!("Rate Limit: {} requests / {:?} per client", limits.max_requests, limits.window);
    match args.global_requests_per_second {
        Some(rps) => info!("Global Limit: {} requests/s", rps),
        None => info!("Global Limit: disabled"),
    }
    info!("Trust Proxy Headers: {}", args.trust_proxy);
    info!("CORS Origins: {}", args.cors_origins.join(", "));
    info!("Static Dir: {}", args.static_dir.as_deref().unwrap_or("none"));
    info!("-------------------------");

    let chat_client = build_chat_client(&args)?;
    let limiter = Arc::new(SlidingWindowLimiter::new(limits));

    let mut state = AppState::new(chat_client, limiter, args.chat_llm_type, args.default_model.clone())
        .with_request_timeout(args.request_timeout())
        .with_trust_proxy(args.trust_proxy);
    if let Some(rps) = args.global_requests_per_second {
        state = state.with_burst_guard(BurstGuard::per_second(rps));
    }

    let server = Server::new(args, state);
    server.run().await?;

    Ok(())
}

/// `None` when the provider needs a key and none was given; chat calls then fail with API_KEY_MISSING.
fn build_chat_client(
    args: &Args
) -> Result<Option<Arc<dyn ChatClient>>, Box<dyn Error + Send + Sync>> {
    let config = args.llm_config();
    if config.llm_type.requires_api_key() && config.api_key.is_none() {
        warn!("CHAT_API_KEY not set. /api/chat will answer 500 API_KEY_MISSING until it is configured.");
        return Ok(None);
    }

    let client = new_client(&config)?;
    info!(
        "Chat client configured: Type={}, BaseURL={}",
        client.provider(),
        client.get_base_url()
    );
    Ok(Some(client))
}

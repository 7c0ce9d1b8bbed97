pub mod api;
pub mod middleware;

use crate::cli::Args;
use crate::llm::chat::ChatClient;
use crate::llm::LlmType;
use crate::rate_limit::{ BurstGuard, SlidingWindowLimiter };
use axum::{
    extract::DefaultBodyLimit,
    http::{ header, HeaderValue, Method },
    middleware as axum_middleware,
    routing::{ any, get, post },
    Router,
};
use log::{ error, info, warn };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{ Duration, Instant };
use tower::ServiceBuilder;
use tower_http::cors::{ AllowOrigin, Any, CorsLayer };
use tower_http::services::ServeDir;

/// Shared by every handler. Cloning is cheap; the limiter is the only mutable part.
#[derive(Clone)]
pub struct AppState {
    pub chat_client: Option<Arc<dyn ChatClient>>,
    pub limiter: Arc<SlidingWindowLimiter>,
    pub burst_guard: Option<Arc<BurstGuard>>,
    pub provider: LlmType,
    pub default_model: String,
    pub request_timeout: Duration,
    pub trust_proxy: bool,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        chat_client: Option<Arc<dyn ChatClient>>,
        limiter: Arc<SlidingWindowLimiter>,
        provider: LlmType,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            chat_client,
            limiter,
            burst_guard: None,
            provider,
            default_model: default_model.into(),
            request_timeout: Duration::from_secs(30),
            trust_proxy: false,
            started_at: Instant::now(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_burst_guard(mut self, guard: BurstGuard) -> Self {
        self.burst_guard = Some(Arc::new(guard));
        self
    }

    pub fn with_trust_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }
}

/// Origins allowed when nothing else is configured; the local widget dev servers.
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5500",
];

#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub cors_origins: Vec<String>,
    pub max_body_bytes: usize,
    pub static_dir: Option<String>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
            max_body_bytes: 10 * 1024 * 1024,
            static_dir: None,
        }
    }
}

impl HttpOptions {
    pub fn from_args(args: &Args) -> Self {
        Self {
            cors_origins: args.cors_origins.clone(),
            max_body_bytes: args.max_body_bytes,
            static_dir: args.static_dir.clone(),
        }
    }
}

pub fn build_router(state: AppState, options: &HttpOptions) -> Router {
    let chat = Router::new()
        .route("/api/chat", post(api::chat_handler))
        .route_layer(
            axum_middleware::from_fn_with_state(state.clone(), middleware::enforce_rate_limit)
        );

    let mut app = Router::new()
        .merge(chat)
        .route("/api/health", get(api::health_handler))
        .route("/api/models", get(api::models_handler))
        .route("/api/{*rest}", any(api::not_found_handler));

    if let Some(dir) = &options.static_dir {
        info!("Serving static widget assets from {}", dir);
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(
        ServiceBuilder::new()
            .layer(cors_layer(&options.cors_origins))
            .layer(axum_middleware::from_fn(middleware::log_request))
            .layer(DefaultBodyLimit::max(options.max_body_bytes))
    ).with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    if origins.iter().any(|o| o.trim() == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Ignoring invalid CORS origin '{}': {}", o, e);
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(allowed)).allow_credentials(true)
}

pub struct Server {
    args: Args,
    state: AppState,
}

impl Server {
    pub fn new(args: Args, state: AppState) -> Self {
        Self { args, state }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.args.server_addr.parse::<SocketAddr>()?;

        self.spawn_limiter_sweep();

        let app = build_router(self.state.clone(), &HttpOptions::from_args(&self.args));
        let service = app.into_make_service_with_connect_info::<SocketAddr>();

        if self.args.enable_tls {
            let (cert_path, key_path) = match (&self.args.tls_cert_path, &self.args.tls_key_path) {
                (Some(cert), Some(key)) => (cert, key),
                (Some(_), None) | (None, Some(_)) => {
                    error!(
                        "Both --tls-cert-path and --tls-key-path must be provided to enable TLS."
                    );
                    return Err("Missing TLS certificate or key path".into());
                }
                (None, None) => {
                    error!("--enable-tls was set but no certificate/key paths provided.");
                    return Err("TLS enabled without cert/key".into());
                }
            };
            info!(
                "TLS enabled. Loading certificate from '{}' and key from '{}'",
                cert_path,
                key_path
            );
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                cert_path,
                key_path
            ).await?;

            info!("Chat relay listening on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config).serve(service).await?;
        } else {
            let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
                error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                e
            })?;
            info!("Chat relay listening on http://{}", addr);
            axum::serve(listener, service).await?;
        }

        Ok(())
    }

    fn spawn_limiter_sweep(&self) {
        if self.args.rate_limit_sweep_secs == 0 {
            warn!("Rate limiter sweep disabled; idle clients are never evicted.");
            return;
        }
        let every = Duration::from_secs(self.args.rate_limit_sweep_secs);
        let limiter = Arc::clone(&self.state.limiter);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.evict_idle();
                if removed > 0 {
                    info!(
                        "Evicted {} idle clients from rate limiter ({} still tracked)",
                        removed,
                        limiter.tracked_identities()
                    );
                }
            }
        });
    }
}

use super::AppState;
use crate::error::RelayError;
use axum::{
    extract::{ ConnectInfo, Request, State },
    middleware::Next,
    response::{ IntoResponse, Response },
};
use log::{ info, warn };
use std::net::SocketAddr;
use std::time::{ Duration, Instant };

pub const UNKNOWN_CLIENT: &str = "unknown";

/// Who a request counts against: the peer IP, or the first `X-Forwarded-For`
/// hop when the relay sits behind a trusted proxy.
pub fn client_identity(req: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let identity = client_identity(&req, state.trust_proxy);

    if let Some(guard) = &state.burst_guard {
        if !guard.admit() {
            warn!("Global request rate exceeded. Rejecting request from {}.", identity);
            return (RelayError::RateLimitExceeded {
                retry_after: Duration::from_secs(1),
            }).into_response();
        }
    }

    match state.limiter.check(&identity) {
        Ok(()) => next.run(req).await,
        Err(rejected) => {
            warn!(
                "Rate limit exceeded for {}. Retry in {:?}.",
                identity,
                rejected.retry_after
            );
            (RelayError::RateLimitExceeded {
                retry_after: rejected.retry_after,
            }).into_response()
        }
    }
}

pub async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let peer = client_identity(&req, false);
    let started = Instant::now();

    let response = next.run(req).await;

    info!(
        "{} {} from {} -> {} in {:?}",
        method,
        path,
        peer,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

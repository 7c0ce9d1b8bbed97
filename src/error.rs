use crate::llm::chat::UpstreamError;
use axum::{
    http::{ header::RETRY_AFTER, HeaderValue, StatusCode },
    response::{ IntoResponse, Response },
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Every way a relay call can fail, as seen by the caller.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Invalid message format at index {index}. Required: role and content")]
    InvalidMessageFormat {
        index: usize,
    },

    #[error("Invalid role '{role}' at index {index}. Must be 'user', 'assistant', or 'system'")]
    InvalidRole {
        index: usize,
        role: String,
    },

    #[error("Rate limit exceeded. Please try again in a minute.")]
    RateLimitExceeded {
        retry_after: Duration,
    },

    #[error("API rate limit exceeded. Please try again later.")]
    UpstreamRateLimited,

    #[error("Invalid API key. Please check your credentials.")]
    Unauthenticated,

    #[error("Upstream API key not configured")]
    ApiKeyMissing,

    #[error("Service temporarily unavailable. Please try again.")]
    ServiceUnavailable(String),

    #[error("Failed to process your request")]
    Internal(String),

    #[error("API endpoint not found")]
    NotFound(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidRequest(_)
            | RelayError::InvalidMessageFormat { .. }
            | RelayError::InvalidRole { .. } => StatusCode::BAD_REQUEST,
            RelayError::RateLimitExceeded { .. } | RelayError::UpstreamRateLimited =>
                StatusCode::TOO_MANY_REQUESTS,
            RelayError::Unauthenticated => StatusCode::UNAUTHORIZED,
            RelayError::ApiKeyMissing | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Machine-readable code carried in the `code` field of the error body.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::InvalidRequest(_) => "INVALID_REQUEST",
            RelayError::InvalidMessageFormat { .. } => "INVALID_MESSAGE_FORMAT",
            RelayError::InvalidRole { .. } => "INVALID_ROLE",
            RelayError::RateLimitExceeded { .. } | RelayError::UpstreamRateLimited =>
                "RATE_LIMIT_EXCEEDED",
            RelayError::Unauthenticated => "INVALID_API_KEY",
            RelayError::ApiKeyMissing => "API_KEY_MISSING",
            RelayError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            RelayError::Internal(_) => "INTERNAL_ERROR",
            RelayError::NotFound(_) => "NOT_FOUND",
        }
    }
}

impl From<UpstreamError> for RelayError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Unauthorized => RelayError::Unauthenticated,
            UpstreamError::RateLimited => RelayError::UpstreamRateLimited,
            UpstreamError::Unreachable(msg) => RelayError::ServiceUnavailable(msg),
            UpstreamError::Timeout(after) =>
                RelayError::ServiceUnavailable(format!("upstream timed out after {:?}", after)),
            other => RelayError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
            details: match &self {
                RelayError::Internal(details) => Some(details.clone()),
                _ => None,
            },
            path: match &self {
                RelayError::NotFound(path) => Some(path.clone()),
                _ => None,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let RelayError::RateLimitExceeded { retry_after } = self {
            let secs = retry_after_secs(retry_after);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

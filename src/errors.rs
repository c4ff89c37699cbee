use std::time::Duration;

use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("query not allowed")]
    QueryNotAllowed,
    #[error("rate limit exceeded")]
    RateLimitExceeded { retry_after: Duration },
    #[error("invalid upstream URI: {0}")]
    InvalidUri(String),
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper::Error),
    #[error("upstream returned {0}")]
    UpstreamStatus(StatusCode),
    #[error("upstream timed out after {0:?}")]
    UpstreamTimeout(Duration),
    #[error("upstream body is not JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

impl GatewayError {
    /// Status and client-facing message. Never includes request input or upstream detail.
    pub fn status_and_message(&self) -> (StatusCode, &'static str) {
        match self {
            Self::QueryNotAllowed => (StatusCode::BAD_REQUEST, "Query not allowed"),
            Self::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please try again later.",
            ),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
        }
    }
}

impl warp::reject::Reject for GatewayError {}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

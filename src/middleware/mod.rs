use crate::config::GatewayConfig;
use crate::errors::GatewayError;
use crate::services::RateLimiter;
use std::net::SocketAddr;
use tracing::warn;
use warp::http::Method;
use warp::{Filter, Rejection};

#[cfg(test)]
mod tests;

/// Key used when the transport exposes no peer address.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Origins outside a non-empty allow-list are rejected by the filter itself.
pub fn cors(config: &GatewayConfig) -> warp::cors::Builder {
    let builder = warp::cors()
        .allow_methods(vec![Method::GET, Method::OPTIONS])
        .allow_header("content-type");

    if config.allowed_origins.is_empty() {
        builder.allow_any_origin()
    } else {
        builder.allow_origins(config.allowed_origins.iter().map(String::as_str))
    }
}

pub fn client_key(remote: Option<SocketAddr>) -> String {
    remote
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

pub fn rate_limit(limiter: RateLimiter) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::addr::remote()
        .and_then(move |remote: Option<SocketAddr>| {
            let limiter = limiter.clone();
            async move {
                let client = client_key(remote);
                match limiter.check(&client).await {
                    Ok(()) => Ok(()),
                    Err(retry_after) => {
                        warn!(%client, ?retry_after, "rate limit exceeded");
                        Err(warp::reject::custom(GatewayError::RateLimitExceeded { retry_after }))
                    }
                }
            }
        })
        .untuple_one()
}

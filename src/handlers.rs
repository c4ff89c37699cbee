use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use hyper::{Body, StatusCode};
use serde_json::json;
use tracing::{error, warn};
use warp::http::header::{HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use warp::reply::Response;
use warp::{Rejection, Reply};

use crate::errors::{ErrorBody, GatewayError};
use crate::models::MetricsQuery;
use crate::services::PrometheusClient;


pub async fn health() -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&json!({ "status": "ok" })))
}

pub async fn query_metrics(
    params: MetricsQuery,
    allowed: Arc<HashSet<String>>,
    client: PrometheusClient,
) -> Result<Response, Rejection> {
    let q = match params.q {
        Some(q) if allowed.contains(&q) => q,
        _ => {
            warn!("query outside the allow-list rejected");
            return Err(warp::reject::custom(GatewayError::QueryNotAllowed));
        }
    };

    let body = client.query(&q).await.map_err(|e| {
        error!(error = ?e, query = %q, "upstream query failed");
        warp::reject::custom(e)
    })?;
    Ok(json_response(body))
}

pub async fn targets(client: PrometheusClient) -> Result<Response, Rejection> {
    let body = client.targets().await.map_err(|e| {
        error!(error = ?e, "upstream targets request failed");
        warp::reject::custom(e)
    })?;
    Ok(json_response(body))
}

/// Wraps an already-validated JSON body without re-serializing it.
fn json_response(body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let mut retry_after = None;
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found")
    } else if let Some(e) = err.find::<GatewayError>() {
        if let GatewayError::RateLimitExceeded { retry_after: wait } = e {
            retry_after = Some(*wait);
        }
        e.status_and_message()
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        error!(rejection = ?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    };

    let body = ErrorBody {
        error: message.to_string(),
    };
    let mut response = warp::reply::with_status(warp::reply::json(&body), code).into_response();

    if let Some(wait) = retry_after {
        // Round up so clients never retry inside the window.
        let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
        response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
    }

    Ok(response)
}

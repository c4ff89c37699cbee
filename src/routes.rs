use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;

use warp::{Filter, Rejection, Reply};

use crate::config::GatewayConfig;
use crate::handlers;
use crate::middleware;
use crate::models::MetricsQuery;
use crate::services::{PrometheusClient, RateLimiter};

pub fn routes(
    config: &GatewayConfig,
    limiter: RateLimiter,
    client: PrometheusClient,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let allowed_queries = Arc::new(config.allowed_queries.clone());

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(handlers::health);

    let query = warp::path!("metrics" / "query")
        .and(warp::get())
        .and(query_params())
        .and(with_allowed(allowed_queries))
        .and(with_client(client.clone()))
        .and_then(handlers::query_metrics);

    let targets = warp::path!("metrics" / "targets")
        .and(warp::get())
        .and(with_client(client))
        .and_then(handlers::targets);

    middleware::rate_limit(limiter)
        .and(health.or(query).or(targets))
        .recover(handlers::handle_rejection)
        .with(warp::trace::request())
        .with(middleware::cors(config))
}

// A malformed query string is treated as an absent `q`.
fn query_params() -> impl Filter<Extract = (MetricsQuery,), Error = Infallible> + Clone {
    warp::query::<MetricsQuery>()
        .or_else(|_| async { Ok::<(MetricsQuery,), Infallible>((MetricsQuery::default(),)) })
}

fn with_allowed(
    allowed: Arc<HashSet<String>>,
) -> impl Filter<Extract = (Arc<HashSet<String>>,), Error = Infallible> + Clone {
    warp::any().map(move || allowed.clone())
}

fn with_client(client: PrometheusClient) -> impl Filter<Extract = (PrometheusClient,), Error = Infallible> + Clone {
    warp::any().map(move || client.clone())
}

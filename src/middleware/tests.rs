use super::*;
use crate::models::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use warp::http::StatusCode;

fn config(origins: &[&str]) -> GatewayConfig {
    let origins = origins.join(",");
    GatewayConfig::from_lookup(|key| match key {
        "ALLOWED_ORIGINS" => Some(origins.clone()),
        _ => None,
    })
    .unwrap()
}

fn ok_route(config: &GatewayConfig) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    warp::path("health").map(|| "ok").with(cors(config))
}

#[tokio::test]
async fn test_cors_allows_listed_origin() {
    let route = ok_route(&config(&["https://a.example"]));
    let resp = warp::test::request()
        .path("/health")
        .header("origin", "https://a.example")
        .reply(&route)
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "https://a.example"
    );
}

#[tokio::test]
async fn test_cors_rejects_unlisted_origin() {
    let route = ok_route(&config(&["https://a.example"]));
    let resp = warp::test::request()
        .path("/health")
        .header("origin", "https://b.example")
        .reply(&route)
        .await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cors_without_origin_header_passes() {
    let route = ok_route(&config(&["https://a.example"]));
    let resp = warp::test::request().path("/health").reply(&route).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_cors_empty_list_allows_any_origin() {
    let route = ok_route(&config(&[]));
    let resp = warp::test::request()
        .path("/health")
        .header("origin", "https://anything.example")
        .reply(&route)
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cors_preflight_from_listed_origin() {
    let route = ok_route(&config(&["https://a.example"]));
    let resp = warp::test::request()
        .method("OPTIONS")
        .path("/health")
        .header("origin", "https://a.example")
        .header("access-control-request-method", "GET")
        .header("access-control-request-headers", "content-type")
        .reply(&route)
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "https://a.example"
    );
    let methods = resp
        .headers()
        .get("access-control-allow-methods")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(methods.contains("GET"));
    assert!(methods.contains("OPTIONS"));
}

#[tokio::test]
async fn test_cors_preflight_rejected() {
    let route = ok_route(&config(&["https://a.example"]));

    let unlisted_origin = warp::test::request()
        .method("OPTIONS")
        .path("/health")
        .header("origin", "https://b.example")
        .header("access-control-request-method", "GET")
        .reply(&route)
        .await;
    assert_eq!(unlisted_origin.status(), StatusCode::FORBIDDEN);
    assert!(unlisted_origin.headers().get("access-control-allow-origin").is_none());

    let unlisted_method = warp::test::request()
        .method("OPTIONS")
        .path("/health")
        .header("origin", "https://a.example")
        .header("access-control-request-method", "DELETE")
        .reply(&route)
        .await;
    assert_eq!(unlisted_method.status(), StatusCode::FORBIDDEN);
}

#[test]
fn test_client_key() {
    assert_eq!(client_key(Some("10.1.2.3:5555".parse().unwrap())), "10.1.2.3");
    assert_eq!(client_key(None), UNKNOWN_CLIENT);
}

#[tokio::test]
async fn test_rate_limit_filter_rejects_after_ceiling() {
    let limiter = RateLimiter::new(Arc::new(RwLock::new(AppState::new())), 2, Duration::from_secs(60));
    let filter = rate_limit(limiter).map(|| "ok");
    let addr: SocketAddr = "192.0.2.7:40000".parse().unwrap();

    for _ in 0..2 {
        assert!(warp::test::request().remote_addr(addr).filter(&filter).await.is_ok());
    }

    let rejection = warp::test::request()
        .remote_addr(addr)
        .filter(&filter)
        .await
        .unwrap_err();
    assert!(matches!(
        rejection.find::<GatewayError>(),
        Some(GatewayError::RateLimitExceeded { .. })
    ));
}

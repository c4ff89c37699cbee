use crate::errors::GatewayError;
use crate::models::{AppState, RateLimit};
use bytes::Bytes;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use serde::de::IgnoredAny;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::debug;


pub const QUERY_PATH: &str = "/api/v1/query";
pub const TARGETS_PATH: &str = "/api/v1/targets";

#[derive(Clone)]
pub struct RateLimiter {
    state: Arc<RwLock<AppState>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(state: Arc<RwLock<AppState>>, max_requests: u32, window: Duration) -> Self {
        Self {
            state,
            max_requests,
            window,
        }
    }

    pub fn state(&self) -> &Arc<RwLock<AppState>> {
        &self.state
    }

    /// On overflow returns the time left in the current window.
    pub async fn check(&self, client: &str) -> Result<(), Duration> {
        let mut state = self.state.write().await;
        let now = Instant::now();
        let window = self.window;

        let rate_limit = state
            .rate_limits
            .entry(client.to_string())
            .and_modify(|rl| {
                if now.duration_since(rl.window_start) >= window {
                    rl.count = 1;
                    rl.window_start = now;
                } else {
                    rl.count = rl.count.saturating_add(1);
                }
            })
            .or_insert_with(|| RateLimit {
                count: 1,
                window_start: now,
            });

        if rate_limit.count <= self.max_requests {
            Ok(())
        } else {
            Err(window.saturating_sub(now.duration_since(rate_limit.window_start)))
        }
    }

    pub async fn purge_expired(&self) -> usize {
        let mut state = self.state.write().await;
        let now = Instant::now();
        let before = state.rate_limits.len();
        state
            .rate_limits
            .retain(|_, rl| now.duration_since(rl.window_start) < self.window);
        before - state.rate_limits.len()
    }
}

#[derive(Clone)]
pub struct PrometheusClient {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    base_url: Arc<str>,
    timeout: Duration,
}

impl PrometheusClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder().build(upstream_connector()),
            base_url: Arc::from(base_url.trim_end_matches('/')),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn query_uri(&self, q: &str) -> String {
        format!("{}{}?query={}", self.base_url, QUERY_PATH, urlencoding::encode(q))
    }

    pub async fn query(&self, q: &str) -> Result<Bytes, GatewayError> {
        self.get_json(&self.query_uri(q)).await
    }

    pub async fn targets(&self) -> Result<Bytes, GatewayError> {
        self.get_json(&format!("{}{}", self.base_url, TARGETS_PATH)).await
    }

    async fn get_json(&self, uri_str: &str) -> Result<Bytes, GatewayError> {
        let uri: Uri = uri_str
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| GatewayError::InvalidUri(e.to_string()))?;

        let fetch = async {
            let response = self.client.get(uri).await?;
            let status = response.status();
            if !status.is_success() {
                return Err(GatewayError::UpstreamStatus(status));
            }
            Ok::<Bytes, GatewayError>(hyper::body::to_bytes(response.into_body()).await?)
        };

        let started = Instant::now();
        let body = timeout(self.timeout, fetch)
            .await
            .map_err(|_| GatewayError::UpstreamTimeout(self.timeout))??;

        serde_json::from_slice::<IgnoredAny>(&body)?;
        debug!(uri = uri_str, bytes = body.len(), elapsed_ms = started.elapsed().as_millis() as u64, "upstream ok");
        Ok(body)
    }
}

fn upstream_connector() -> HttpsConnector<HttpConnector> {
    HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build()
}

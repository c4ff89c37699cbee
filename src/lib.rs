pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

pub use config::{ConfigError, GatewayConfig};
pub use errors::GatewayError;
pub use models::{AppState, RateLimit};
pub use routes::routes;
pub use services::{PrometheusClient, RateLimiter};

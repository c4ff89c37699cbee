use std::collections::HashMap;
use std::time::Instant;

use serde::Deserialize;

pub struct RateLimit {
    pub count: u32,
    pub window_start: Instant,
}

#[derive(Default)]
pub struct AppState {
    pub rate_limits: HashMap<String, RateLimit>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MetricsQuery {
    pub q: Option<String>,
}

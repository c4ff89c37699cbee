use std::collections::HashSet;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_UPSTREAM_BASE: &str = "http://127.0.0.1:9090";
pub const DEFAULT_ALLOWED_QUERIES: &str = "up";
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 60; // requests per window
pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub upstream_base_url: String,
    /// Empty means any origin is accepted.
    pub allowed_origins: HashSet<String>,
    pub allowed_queries: HashSet<String>,
    pub rate_limit_window: Duration,
    pub rate_limit_max: u32,
    pub upstream_timeout: Duration,
    pub log_level: String,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let upstream_base_url = lookup("PROMETHEUS_BASE_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_UPSTREAM_BASE.to_string());
        if !(upstream_base_url.starts_with("http://") || upstream_base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "PROMETHEUS_BASE_URL",
                reason: format!("expected an http:// or https:// URL, got {upstream_base_url}"),
            });
        }

        let window_secs: u64 = parse_or(&lookup, "RATE_LIMIT_WINDOW_SECS", DEFAULT_RATE_LIMIT_WINDOW_SECS)?;
        let rate_limit_max: u32 = parse_or(&lookup, "RATE_LIMIT_MAX", DEFAULT_RATE_LIMIT_MAX)?;
        let timeout_ms: u64 = parse_or(&lookup, "UPSTREAM_TIMEOUT_MS", DEFAULT_UPSTREAM_TIMEOUT_MS)?;
        require_positive("RATE_LIMIT_WINDOW_SECS", window_secs)?;
        require_positive("RATE_LIMIT_MAX", u64::from(rate_limit_max))?;
        require_positive("UPSTREAM_TIMEOUT_MS", timeout_ms)?;

        let allowed_origins = parse_origins(&lookup("ALLOWED_ORIGINS").unwrap_or_default())?;

        Ok(Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            upstream_base_url: upstream_base_url.trim_end_matches('/').to_string(),
            allowed_origins,
            allowed_queries: split_list(
                &lookup("ALLOWED_QUERIES").unwrap_or_else(|| DEFAULT_ALLOWED_QUERIES.to_string()),
            ),
            rate_limit_window: Duration::from_secs(window_secs),
            rate_limit_max,
            upstream_timeout: Duration::from_millis(timeout_ms),
            log_level: lookup("LOG_LEVEL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        _ => Ok(default),
    }
}

fn require_positive(key: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

fn parse_origins(raw: &str) -> Result<HashSet<String>, ConfigError> {
    let origins = split_list(raw);
    // `*` means any origin
    if origins.contains("*") {
        return Ok(HashSet::new());
    }
    for origin in &origins {
        let valid = origin
            .parse::<http::Uri>()
            .map(|uri| {
                uri.scheme().is_some()
                    && uri.authority().is_some()
                    && uri.path_and_query().map_or(true, |pq| pq.as_str() == "/")
            })
            .unwrap_or(false);
        if !valid || origin.ends_with('/') {
            return Err(ConfigError::Invalid {
                key: "ALLOWED_ORIGINS",
                reason: format!("{origin} is not a scheme://host[:port] origin"),
            });
        }
    }
    Ok(origins)
}

/// Comma-separated list; blanks are dropped.
pub fn split_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.upstream_base_url, DEFAULT_UPSTREAM_BASE);
        assert!(config.allowed_origins.is_empty());
        assert_eq!(config.allowed_queries, HashSet::from(["up".to_string()]));
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
        assert_eq!(config.upstream_timeout, Duration::from_millis(5_000));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_lists_are_trimmed() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("ALLOWED_ORIGINS", " https://a.example , ,https://b.example"),
            ("ALLOWED_QUERIES", "up,node_load1"),
        ]))
        .unwrap();
        assert_eq!(config.allowed_origins.len(), 2);
        assert!(config.allowed_origins.contains("https://b.example"));
        assert!(config.allowed_queries.contains("node_load1"));
    }

    #[test]
    fn test_trailing_slash_stripped() {
        let config =
            GatewayConfig::from_lookup(lookup(&[("PROMETHEUS_BASE_URL", "http://prom:9090/")])).unwrap();
        assert_eq!(config.upstream_base_url, "http://prom:9090");
    }

    #[test]
    fn test_https_upstream_accepted() {
        let config =
            GatewayConfig::from_lookup(lookup(&[("PROMETHEUS_BASE_URL", "https://prom.example/")])).unwrap();
        assert_eq!(config.upstream_base_url, "https://prom.example");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(GatewayConfig::from_lookup(lookup(&[("PORT", "eighty")])).is_err());
        assert!(GatewayConfig::from_lookup(lookup(&[("RATE_LIMIT_MAX", "0")])).is_err());
        assert!(GatewayConfig::from_lookup(lookup(&[("PROMETHEUS_BASE_URL", "ftp://prom")])).is_err());
        assert!(GatewayConfig::from_lookup(lookup(&[("ALLOWED_ORIGINS", "a.example")])).is_err());
        assert!(GatewayConfig::from_lookup(lookup(&[("ALLOWED_ORIGINS", "https://a.example/app")])).is_err());
    }

    #[test]
    fn test_wildcard_origin_allows_all() {
        let config =
            GatewayConfig::from_lookup(lookup(&[("ALLOWED_ORIGINS", "https://a.example,*")])).unwrap();
        assert!(config.allowed_origins.is_empty());
    }
}

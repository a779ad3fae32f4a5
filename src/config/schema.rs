//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Interface to bind the public listener on.
    pub bind_host: String,

    /// Public listener port.
    pub proxy_port: u16,

    /// Server-rendered front-end origin.
    pub frontend_url: String,

    /// Backend API origin.
    pub api_url: String,

    /// Canonical public URL of the site. Empty disables every base-URL override.
    pub base_url: String,

    /// Root directory of committed uploads served under `/f/`.
    pub uploads_dir: PathBuf,

    /// Emit one log line per request.
    pub log_requests: bool,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Pool sizing for the frontend and API upstreams, each with its own pool.
    pub pool: PoolConfig,

    /// Dedicated pool for the upload route.
    pub upload_pool: PoolConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            proxy_port: 8080,
            frontend_url: "http://localhost:3000".to_string(),
            api_url: "http://localhost:3333".to_string(),
            base_url: "http://localhost:8080".to_string(),
            uploads_dir: PathBuf::from("uploads"),
            log_requests: true,
            timeouts: TimeoutConfig::default(),
            pool: PoolConfig::default(),
            upload_pool: PoolConfig {
                max_connections: 64,
                ..PoolConfig::default()
            },
            observability: ObservabilityConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Listener address as `host:port`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.proxy_port)
    }

    /// The configured base URL, or `None` when it is blank.
    pub fn base_url(&self) -> Option<&str> {
        let trimmed = self.base_url.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Timeout configuration.
///
/// Values are written as human durations (`"30s"`, `"10m"`, `"1h30m"`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream exchange deadline for every route except uploads.
    #[serde(with = "humanized")]
    pub read: Duration,

    /// Deadline for locally served static assets.
    #[serde(with = "humanized")]
    pub write: Duration,

    /// Idle eviction interval for pooled upstream connections.
    #[serde(with = "humanized")]
    pub idle: Duration,

    /// Upstream exchange deadline for the upload route.
    #[serde(with = "humanized")]
    pub upload_read: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(30),
            write: Duration::from_secs(30),
            idle: Duration::from_secs(120),
            upload_read: Duration::from_secs(10 * 60),
        }
    }
}

/// Outbound connection pool sizing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle connections kept per upstream host.
    pub max_idle_per_host: usize,

    /// Concurrent in-flight exchanges allowed per upstream host.
    pub max_connections: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 10,
            max_connections: 256,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Parse a human duration such as `30s`, `10m`, `1h30m` or `250ms`.
///
/// A bare integer is read as seconds.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let value: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.checked_mul(60)?),
            "h" => Duration::from_secs(value.checked_mul(3600)?),
            _ => return None,
        };
        total = total.checked_add(unit)?;
        rest = &rest[unit_len..];
    }
    Some(total)
}

/// Render a duration in the same notation [`parse_duration`] accepts.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 != 0 {
        return format!("{millis}ms");
    }
    let secs = duration.as_secs();
    match secs {
        s if s != 0 && s % 3600 == 0 => format!("{}h", s / 3600),
        s if s != 0 && s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{s}s"),
    }
}

mod humanized {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => super::parse_duration(&text)
                .ok_or_else(|| de::Error::custom(format!("invalid duration `{text}`"))),
        }
    }
}

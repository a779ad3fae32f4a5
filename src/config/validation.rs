//! Configuration validation.
//!
//! # Responsibilities
//! - Parse every upstream and public URL once, at startup
//! - Validate value ranges (timeouts > 0, pool ceilings > 0)
//! - Hand the parsed origins to the request path so nothing re-parses per request
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<Origins, Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::str::FromStr;
use std::time::Duration;

use axum::http::uri::{Authority, Scheme};
use thiserror::Error;
use tokio::sync::Semaphore;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} `{value}`: {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("{field} must use {expected}, got `{scheme}`")]
    UnsupportedScheme {
        field: &'static str,
        scheme: String,
        expected: &'static str,
    },

    #[error("{field} `{value}` has no host")]
    MissingHost { field: &'static str, value: String },

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("timeouts.upload_read ({upload_read:?}) must not be shorter than timeouts.read ({read:?})")]
    UploadTimeoutTooShort { read: Duration, upload_read: Duration },

    #[error("{0}.max_connections must be greater than zero")]
    ZeroPoolCeiling(&'static str),

    #[error("{pool}.max_connections ({value}) exceeds the limit of {max}")]
    PoolCeilingTooLarge {
        pool: &'static str,
        value: usize,
        max: usize,
    },
}

/// A parsed upstream origin.
#[derive(Debug, Clone)]
pub struct Origin {
    url: Url,
    scheme: Scheme,
    authority: Authority,
}

impl Origin {
    fn parse(field: &'static str, raw: &str) -> Result<Self, ValidationError> {
        let url = parse_url(field, raw)?;
        if url.scheme() != "http" {
            return Err(ValidationError::UnsupportedScheme {
                field,
                scheme: url.scheme().to_string(),
                expected: "plain http (TLS to upstreams is not supported)",
            });
        }
        let authority = authority_of(field, raw, &url)?;
        Ok(Self {
            url,
            scheme: Scheme::HTTP,
            authority,
        })
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// `host[:port]` of the upstream, used as its Host header.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Join the upstream's own path prefix with a request path.
    pub fn join_path(&self, request_path: &str) -> String {
        let prefix = self.url.path().trim_end_matches('/');
        match (prefix.is_empty(), request_path.starts_with('/')) {
            (true, true) => request_path.to_string(),
            (true, false) => format!("/{request_path}"),
            (false, true) => format!("{prefix}{request_path}"),
            (false, false) => format!("{prefix}/{request_path}"),
        }
    }
}

/// The canonical public identity of the site.
#[derive(Debug, Clone)]
pub struct PublicBase {
    url: Url,
    authority: String,
}

impl PublicBase {
    fn parse(raw: &str) -> Result<Self, ValidationError> {
        let field = "base_url";
        let url = parse_url(field, raw)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ValidationError::UnsupportedScheme {
                field,
                scheme: url.scheme().to_string(),
                expected: "http or https",
            });
        }
        let authority = authority_of(field, raw, &url)?.to_string();
        Ok(Self { url, authority })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Public `host[:port]`.
    pub fn host(&self) -> &str {
        &self.authority
    }

    /// Prefix an absolute path with the public base, without doubling slashes.
    pub fn absolute(&self, path: &str) -> String {
        let base = self.url.as_str().trim_end_matches('/');
        format!("{base}{path}")
    }
}

/// Parsed origins, computed once from a validated [`GatewayConfig`].
#[derive(Debug, Clone)]
pub struct Origins {
    pub frontend: Origin,
    pub api: Origin,
    pub base: Option<PublicBase>,
}

/// Validate the configuration and parse its origins.
pub fn validate_config(config: &GatewayConfig) -> Result<Origins, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let frontend = Origin::parse("frontend_url", &config.frontend_url).map_err(|e| errors.push(e)).ok();
    let api = Origin::parse("api_url", &config.api_url).map_err(|e| errors.push(e)).ok();
    let base = match config.base_url() {
        Some(raw) => PublicBase::parse(raw).map_err(|e| errors.push(e)).ok(),
        None => None,
    };

    let timeouts = &config.timeouts;
    for (name, value) in [
        ("read", timeouts.read),
        ("write", timeouts.write),
        ("idle", timeouts.idle),
        ("upload_read", timeouts.upload_read),
    ] {
        if value.is_zero() {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }
    if timeouts.upload_read < timeouts.read {
        errors.push(ValidationError::UploadTimeoutTooShort {
            read: timeouts.read,
            upload_read: timeouts.upload_read,
        });
    }

    for (pool, value) in [
        ("pool", config.pool.max_connections),
        ("upload_pool", config.upload_pool.max_connections),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroPoolCeiling(pool));
        } else if value > Semaphore::MAX_PERMITS {
            errors.push(ValidationError::PoolCeilingTooLarge {
                pool,
                value,
                max: Semaphore::MAX_PERMITS,
            });
        }
    }

    match (frontend, api) {
        (Some(frontend), Some(api)) if errors.is_empty() => Ok(Origins { frontend, api, base }),
        _ => Err(errors),
    }
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ValidationError> {
    Url::parse(raw.trim()).map_err(|e| ValidationError::InvalidUrl {
        field,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn authority_of(field: &'static str, raw: &str, url: &Url) -> Result<Authority, ValidationError> {
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ValidationError::MissingHost {
            field,
            value: raw.to_string(),
        })?;
    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Authority::from_str(&authority).map_err(|e| ValidationError::InvalidUrl {
        field,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

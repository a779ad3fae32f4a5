//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Rewritten outbound request
//!     → forwarder.rs (deadline, classify failures)
//!     → pool.rs (connection ceiling, pooled hyper client)
//!     → Upstream origin
//!     → streamed response back to the client
//! ```
//!
//! # Design Decisions
//! - One pool per target; the upload target never shares the API pool
//! - A failed attempt is terminal, there are no retries
//! - Failures carry a kind, never matched by message text

pub mod failure;
pub mod forwarder;
pub mod pool;

use std::fmt;

use crate::config::{GatewayConfig, Origins};

pub use failure::{FailureKind, ProxyFailure};
pub use forwarder::Forwarder;
pub use pool::UpstreamPool;

/// The upstream a request is forwarded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamTarget {
    Frontend,
    Api,
    /// API-bound uploads, with their own pool and a longer deadline.
    Upload,
}

impl UpstreamTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamTarget::Frontend => "frontend",
            UpstreamTarget::Api => "api",
            UpstreamTarget::Upload => "upload",
        }
    }

    /// Name shown to clients when the upstream is unreachable.
    pub fn display_name(&self) -> &'static str {
        match self {
            UpstreamTarget::Frontend => "Frontend server",
            UpstreamTarget::Api | UpstreamTarget::Upload => "API server",
        }
    }

    /// Whether the API header policy applies.
    pub fn is_api_bound(&self) -> bool {
        matches!(self, UpstreamTarget::Api | UpstreamTarget::Upload)
    }
}

impl fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One forwarder per target.
#[derive(Debug)]
pub struct Upstreams {
    frontend: Forwarder,
    api: Forwarder,
    upload: Forwarder,
}

impl Upstreams {
    pub fn new(config: &GatewayConfig, origins: &Origins) -> Self {
        let idle = config.timeouts.idle;
        let read = config.timeouts.read;
        tracing::debug!(
            frontend = %origins.frontend.authority(),
            api = %origins.api.authority(),
            "Creating upstream pools"
        );
        Self {
            frontend: Forwarder::new(
                UpstreamTarget::Frontend,
                &config.frontend_url,
                UpstreamPool::new(&config.pool, idle),
                read,
            ),
            api: Forwarder::new(
                UpstreamTarget::Api,
                &config.api_url,
                UpstreamPool::new(&config.pool, idle),
                read,
            ),
            upload: Forwarder::new(
                UpstreamTarget::Upload,
                &config.api_url,
                UpstreamPool::new(&config.upload_pool, idle),
                config.timeouts.upload_read,
            ),
        }
    }

    pub fn get(&self, target: UpstreamTarget) -> &Forwarder {
        match target {
            UpstreamTarget::Frontend => &self.frontend,
            UpstreamTarget::Api => &self.api,
            UpstreamTarget::Upload => &self.upload,
        }
    }
}

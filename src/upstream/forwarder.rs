//! Forwarding of rewritten requests to a single upstream.
//!
//! # Responsibilities
//! - Take a connection slot and send the request through the pooled client
//! - Bound the exchange with the target's deadline
//! - Stream the response back without buffering it
//! - Classify failures for the error responder

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, Response},
};

use crate::http::forwarding::strip_hop_by_hop;
use crate::resilience::timeouts::with_deadline;
use crate::upstream::pool::{PermitBody, UpstreamPool};
use crate::upstream::{ProxyFailure, UpstreamTarget};

/// Forwards requests for one [`UpstreamTarget`].
#[derive(Debug)]
pub struct Forwarder {
    target: UpstreamTarget,
    configured_url: String,
    pool: UpstreamPool,
    deadline: Duration,
}

impl Forwarder {
    pub fn new(
        target: UpstreamTarget,
        configured_url: &str,
        pool: UpstreamPool,
        deadline: Duration,
    ) -> Self {
        tracing::debug!(
            upstream = target.as_str(),
            url = %configured_url,
            deadline = ?deadline,
            max_connections = pool.max_connections(),
            "Upstream forwarder ready"
        );
        Self {
            target,
            configured_url: configured_url.to_string(),
            pool,
            deadline,
        }
    }

    pub fn target(&self) -> UpstreamTarget {
        self.target
    }

    /// The upstream URL as configured, for log lines.
    pub fn configured_url(&self) -> &str {
        &self.configured_url
    }

    /// Forward a fully rewritten request. A single attempt; failure is terminal.
    ///
    /// The request URI must already carry the upstream scheme and authority.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ProxyFailure> {
        let exchange = async {
            let permit = self
                .pool
                .acquire()
                .await
                .ok_or_else(|| ProxyFailure::Other("connection pool closed".into()))?;
            let response = self
                .pool
                .client()
                .request(request)
                .await
                .map_err(ProxyFailure::from_client_error)?;
            Ok((permit, response))
        };

        let (permit, response) = with_deadline(self.deadline, exchange).await?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(PermitBody::new(body, permit))))
    }
}

//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request IDs (UUID v4) for requests that lack one
//! - Bundle the inbound request with its connection facts (peer address, TLS)
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - An `x-request-id` sent by the client is kept and forwarded upstream

use std::net::SocketAddr;

use axum::http::{header, uri::Scheme, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Mints a UUID v4 request ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// An inbound request plus the connection facts header synthesis needs.
#[derive(Debug)]
pub struct IncomingRequest<B> {
    pub request: Request<B>,
    pub remote_addr: Option<SocketAddr>,
    pub tls: bool,
}

impl<B> IncomingRequest<B> {
    /// TLS presence is read from the request scheme; plain listeners never see `https`.
    pub fn new(request: Request<B>, remote_addr: Option<SocketAddr>) -> Self {
        let tls = request.uri().scheme() == Some(&Scheme::HTTPS);
        Self {
            request,
            remote_addr,
            tls,
        }
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// The Host the client addressed: the `Host` header, else the URI authority.
    pub fn host(&self) -> Option<&str> {
        self.request
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .filter(|h| !h.is_empty())
            .or_else(|| self.request.uri().authority().map(|a| a.as_str()))
    }

    pub fn path(&self) -> &str {
        self.request.uri().path()
    }
}

//! Forwarding header synthesis and outbound request rewriting.
//!
//! # Responsibilities
//! - Resolve the client protocol, client IP and original Host once per request
//! - Append to `X-Forwarded-For`, set `X-Real-IP`, synthesize `Forwarded`
//! - Pick the outbound Host: the API's own host, or the public Host for the front-end
//! - Strip hop-by-hop headers
//!
//! # Design Decisions
//! - `rewrite` is a pure function of (request, target, origins); no I/O
//! - The configured base URL always wins for front-end `X-Forwarded-Host`/`-Proto`
//! - `X-Forwarded-For` is appended for every target, never stripped

use axum::http::{
    header::{self, HeaderName},
    uri::PathAndQuery,
    HeaderMap, HeaderValue, Request, Uri, Version,
};

use crate::config::{Origin, Origins, PublicBase};
use crate::http::request::IncomingRequest;
use crate::http::rewrite::{redirect_internal_api, rewrite_image_query};
use crate::upstream::UpstreamTarget;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Per-request forwarding facts, derived once before any header is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingContext {
    proto: String,
    client_ip: Option<String>,
    original_host: String,
    forwarded: String,
}

impl ForwardingContext {
    pub fn resolve<B>(incoming: &IncomingRequest<B>, base: Option<&PublicBase>) -> Self {
        let proto = resolve_proto(incoming, base);
        let client_ip = incoming
            .remote_addr
            .map(|addr| addr.ip().to_canonical().to_string());
        let original_host = incoming.host().unwrap_or_default().to_string();
        let forwarded = format!(
            "for={};host={};proto={}",
            client_ip.as_deref().unwrap_or("unknown"),
            original_host,
            proto
        );
        Self {
            proto,
            client_ip,
            original_host,
            forwarded,
        }
    }

    pub fn proto(&self) -> &str {
        &self.proto
    }

    pub fn client_ip(&self) -> Option<&str> {
        self.client_ip.as_deref()
    }

    pub fn original_host(&self) -> &str {
        &self.original_host
    }

    /// Value used when the request carries no `Forwarded` header.
    pub fn forwarded(&self) -> &str {
        &self.forwarded
    }
}

/// `X-Forwarded-Proto`, then TLS, then the base URL scheme, then `http`.
fn resolve_proto<B>(incoming: &IncomingRequest<B>, base: Option<&PublicBase>) -> String {
    if let Some(proto) = incoming
        .request
        .headers()
        .get(&X_FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return proto.to_string();
    }
    if incoming.tls {
        return "https".to_string();
    }
    match base {
        Some(base) => base.scheme().to_string(),
        None => "http".to_string(),
    }
}

/// A request ready for an upstream forwarder.
#[derive(Debug)]
pub struct Outbound<B> {
    /// Effective target, after internal-API redirection.
    pub target: UpstreamTarget,
    pub request: Request<B>,
}

/// Rewrite an inbound request for `target`.
pub fn rewrite<B>(
    incoming: IncomingRequest<B>,
    target: UpstreamTarget,
    origins: &Origins,
) -> Result<Outbound<B>, axum::http::Error> {
    let context = ForwardingContext::resolve(&incoming, origins.base.as_ref());
    let target = redirect_internal_api(target, incoming.path());
    let origin = match target {
        UpstreamTarget::Frontend => &origins.frontend,
        UpstreamTarget::Api | UpstreamTarget::Upload => &origins.api,
    };

    let (mut parts, body) = incoming.request.into_parts();

    let mut query = parts.uri.query().map(str::to_owned);
    if target == UpstreamTarget::Frontend {
        if let Some(rewritten) = rewrite_image_query(parts.uri.path(), query.as_deref(), origins.base.as_ref()) {
            query = Some(rewritten);
        }
    }
    parts.uri = upstream_uri(origin, parts.uri.path(), query.as_deref())?;
    parts.version = Version::HTTP_11;

    strip_hop_by_hop(&mut parts.headers);
    apply_forwarding_headers(&mut parts.headers, target, &context, origin, origins.base.as_ref());

    Ok(Outbound {
        target,
        request: Request::from_parts(parts, body),
    })
}

fn upstream_uri(origin: &Origin, path: &str, query: Option<&str>) -> Result<Uri, axum::http::Error> {
    let path = origin.join_path(path);
    let path_and_query = match query {
        Some(query) => PathAndQuery::try_from(format!("{path}?{query}"))?,
        None => PathAndQuery::try_from(path)?,
    };
    Uri::builder()
        .scheme(origin.scheme().clone())
        .authority(origin.authority().clone())
        .path_and_query(path_and_query)
        .build()
}

/// Apply the forwarding header policy for `target` to outbound headers.
pub fn apply_forwarding_headers(
    headers: &mut HeaderMap,
    target: UpstreamTarget,
    context: &ForwardingContext,
    origin: &Origin,
    base: Option<&PublicBase>,
) {
    if let Some(ip) = context.client_ip() {
        let prior: Vec<&str> = headers
            .get_all(&X_FORWARDED_FOR)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .collect();
        let chain = if prior.is_empty() {
            ip.to_string()
        } else {
            format!("{}, {}", prior.join(", "), ip)
        };
        set(headers, X_FORWARDED_FOR, &chain);
        set(headers, X_REAL_IP, ip);
    }

    if target.is_api_bound() {
        set(headers, header::HOST, origin.authority().as_str());
        set_if_absent(headers, X_FORWARDED_PROTO, context.proto());
        set_if_absent(headers, X_FORWARDED_HOST, context.original_host());
    } else {
        let host = match context.original_host() {
            "" => origin.authority().as_str(),
            host => host,
        };
        set(headers, header::HOST, host);
        set_if_absent(headers, X_FORWARDED_HOST, context.original_host());
        set_if_absent(headers, X_FORWARDED_PROTO, context.proto());
        if let Some(base) = base {
            set(headers, X_FORWARDED_PROTO, base.scheme());
            set(headers, X_FORWARDED_HOST, base.host());
        }
    }

    set_if_absent(headers, header::FORWARDED, context.forwarded());
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::try_from(name.trim()).ok())
        .collect();
    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

fn set(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

fn set_if_absent(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if value.is_empty() {
        return;
    }
    let present = headers
        .get(&name)
        .is_some_and(|v| !v.as_bytes().is_empty());
    if !present {
        set(headers, name, value);
    }
}

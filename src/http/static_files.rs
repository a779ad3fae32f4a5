//! Committed uploads served under `/f/`.
//!
//! # Responsibilities
//! - Percent-decode and canonicalize the requested path before touching the disk
//! - Hide the reserved `tmp` subtree (in-flight uploads) behind a plain 404
//! - Serve files with a long-lived immutable `Cache-Control`
//!
//! # Design Decisions
//! - Canonicalization is lexical and always rooted, so `..` can never climb
//!   above the uploads root
//! - Directories are never listed or indexed

use std::path::Path;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, Response, StatusCode, Uri},
    response::IntoResponse,
};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::http::rewrite::UPLOADS_PREFIX;

/// First path segment that is never publicly reachable.
pub const RESERVED_SEGMENT: &str = "tmp";

/// Cache policy for committed, content-addressed uploads.
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=3600, immutable";

// Characters re-encoded when the canonical path is handed to the file service.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Traversal-safe file server over the uploads root.
#[derive(Debug, Clone)]
pub struct StaticAssets {
    serve_dir: ServeDir,
    deadline: Duration,
}

impl StaticAssets {
    pub fn new(root: impl AsRef<Path>, deadline: Duration) -> Self {
        let serve_dir = ServeDir::new(root).append_index_html_on_directories(false);
        Self { serve_dir, deadline }
    }

    /// Serve a `/f/...` request.
    pub async fn serve(&self, request: Request<Body>) -> Response<Body> {
        let Some(relative) = request.uri().path().strip_prefix(UPLOADS_PREFIX) else {
            return StatusCode::NOT_FOUND.into_response();
        };
        let canonical = canonicalize(relative);
        if is_reserved(&canonical) {
            tracing::debug!(path = %request.uri().path(), "Reserved upload path requested");
            return StatusCode::NOT_FOUND.into_response();
        }

        let (mut parts, body) = request.into_parts();
        parts.uri = match rooted_uri(&canonical, parts.uri.query()) {
            Some(uri) => uri,
            None => return StatusCode::NOT_FOUND.into_response(),
        };
        let request = Request::from_parts(parts, body);

        let served = tokio::time::timeout(self.deadline, self.serve_dir.clone().oneshot(request)).await;
        let response = match served {
            Ok(Ok(response)) => response.map(Body::new),
            Ok(Err(never)) => match never {},
            Err(_) => {
                tracing::warn!(path = %canonical, deadline = ?self.deadline, "Static asset deadline elapsed");
                return StatusCode::REQUEST_TIMEOUT.into_response();
            }
        };

        with_cache_policy(response)
    }
}

fn with_cache_policy(mut response: Response<Body>) -> Response<Body> {
    let status = response.status();
    if status.is_success() || status == StatusCode::NOT_MODIFIED {
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(IMMUTABLE_CACHE_CONTROL),
        );
    }
    response
}

/// Percent-decode and lexically clean a path relative to the uploads root.
///
/// The result is always rooted (`/a/b`), with `.` removed, `..` resolved
/// without climbing above `/`, and repeated separators collapsed.
pub fn canonicalize(relative: &str) -> String {
    let decoded = percent_decode_str(relative).decode_utf8_lossy();
    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Whether a canonical path falls in the reserved subtree.
pub fn is_reserved(canonical: &str) -> bool {
    canonical
        .trim_start_matches('/')
        .split('/')
        .next()
        .is_some_and(|first| first == RESERVED_SEGMENT)
}

fn rooted_uri(canonical: &str, query: Option<&str>) -> Option<Uri> {
    let path = utf8_percent_encode(canonical, PATH_SEGMENT).to_string();
    let uri = match query {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };
    uri.parse().ok()
}

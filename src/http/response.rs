//! Response handling for failed upstream exchanges.
//!
//! # Responsibilities
//! - Turn a classified [`ProxyFailure`] into the client-visible reply
//! - Log each non-cancelled failure once, naming the upstream and its URL
//!
//! # Design Decisions
//! - The JSON envelope never reveals why the upstream was unreachable
//! - Cancellation is silent: the client is gone, so nothing is logged or rendered

use axum::{
    body::Body,
    http::{header, HeaderValue, Response, StatusCode},
};

use crate::observability::metrics;
use crate::upstream::{ProxyFailure, UpstreamTarget};

/// Body of the 502 envelope for `upstream_name`.
pub fn unavailable_body(upstream_name: &str) -> String {
    let error = serde_json::Value::String(format!("{upstream_name} is not available"));
    format!(
        "{{\"error\": {}, \"status\": {}}}",
        error,
        StatusCode::BAD_GATEWAY.as_u16()
    )
}

/// Build the reply for a failed exchange with `target`, configured at `upstream_url`.
pub fn upstream_failure(target: UpstreamTarget, upstream_url: &str, failure: ProxyFailure) -> Response<Body> {
    metrics::record_upstream_failure(target, failure.kind());

    if failure.is_cancelled() {
        return bare(StatusCode::BAD_GATEWAY);
    }

    tracing::error!(
        upstream = target.display_name(),
        url = %upstream_url,
        kind = failure.kind().as_str(),
        error = %failure,
        "{} proxy error",
        target.display_name()
    );

    let mut response = Response::new(Body::from(unavailable_body(target.display_name())));
    *response.status_mut() = StatusCode::BAD_GATEWAY;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

fn bare(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Log sink shared between a test and its subscriber.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes).lines().map(str::to_owned).collect()
        }
    }

    /// Run `f` with every event written to the returned sink.
    fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, Captured) {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        let out = tracing::subscriber::with_default(subscriber, f);
        (out, captured)
    }

    async fn body_of(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn api_failure_envelope_is_exact() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let response = upstream_failure(
            UpstreamTarget::Api,
            "http://localhost:3333",
            ProxyFailure::ConnectionFailed(Box::new(io)),
        );

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(
            body_of(response).await,
            r#"{"error": "API server is not available", "status": 502}"#
        );
    }

    #[tokio::test]
    async fn cause_is_not_distinguished() {
        let timeout = upstream_failure(
            UpstreamTarget::Upload,
            "http://localhost:3333",
            ProxyFailure::Timeout(Duration::from_secs(600)),
        );
        assert_eq!(
            body_of(timeout).await,
            r#"{"error": "API server is not available", "status": 502}"#
        );

        let other = upstream_failure(
            UpstreamTarget::Frontend,
            "http://localhost:3000",
            ProxyFailure::Other("dns lookup failed".into()),
        );
        assert_eq!(
            body_of(other).await,
            r#"{"error": "Frontend server is not available", "status": 502}"#
        );
    }

    #[test]
    fn unreachable_upstream_is_logged_once_with_its_url() {
        let (response, logs) = capture_logs(|| {
            let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
            upstream_failure(
                UpstreamTarget::Api,
                "http://localhost:3333",
                ProxyFailure::ConnectionFailed(Box::new(io)),
            )
        });

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let lines = logs.lines();
        assert_eq!(lines.len(), 1, "{lines:?}");
        assert!(lines[0].contains("ERROR"));
        assert!(lines[0].contains("http://localhost:3333"));
        assert!(lines[0].contains("API server"));
    }

    #[test]
    fn timeout_is_logged_once_with_its_url() {
        let (_, logs) = capture_logs(|| {
            upstream_failure(
                UpstreamTarget::Frontend,
                "http://localhost:3000",
                ProxyFailure::Timeout(Duration::from_secs(30)),
            )
        });

        let lines = logs.lines();
        assert_eq!(lines.len(), 1, "{lines:?}");
        assert!(lines[0].contains("http://localhost:3000"));
        assert!(lines[0].contains("timeout"));
    }

    #[test]
    fn cancellation_is_not_logged() {
        let (response, logs) = capture_logs(|| {
            upstream_failure(UpstreamTarget::Api, "http://localhost:3333", ProxyFailure::Cancelled)
        });

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(logs.lines().is_empty(), "{:?}", logs.lines());
    }

    #[tokio::test]
    async fn cancellation_renders_no_body() {
        let response = upstream_failure(UpstreamTarget::Api, "http://localhost:3333", ProxyFailure::Cancelled);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        assert!(body_of(response).await.is_empty());
    }
}

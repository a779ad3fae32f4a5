//! Failure injection tests for the gateway.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

mod common;

#[tokio::test]
async fn unreachable_api_yields_json_envelope() {
    let frontend = common::start_echo_backend("frontend").await;
    let api = common::unused_addr().await;
    let gateway = common::start_gateway(frontend, api, |_| {}).await;

    let response = common::client().get(gateway.url("/api/files")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(
        response.text().await.unwrap(),
        r#"{"error": "API server is not available", "status": 502}"#
    );
}

#[tokio::test]
async fn unreachable_frontend_is_named() {
    let frontend = common::unused_addr().await;
    let api = common::start_echo_backend("api").await;
    let gateway = common::start_gateway(frontend, api, |_| {}).await;

    let response = common::client().get(gateway.url("/")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        response.text().await.unwrap(),
        r#"{"error": "Frontend server is not available", "status": 502}"#
    );
}

#[tokio::test]
async fn failures_are_terminal_without_retry() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let api = common::start_programmable_backend(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(2)).await;
            (200, "late".into())
        }
    })
    .await;
    let frontend = common::start_echo_backend("frontend").await;
    let gateway = common::start_gateway(frontend, api, |config| {
        config.timeouts.read = Duration::from_millis(200);
    })
    .await;

    let response = common::client().get(gateway.url("/api/slow")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn uploads_get_the_extended_deadline() {
    let api = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_millis(600)).await;
        (200, "stored".into())
    })
    .await;
    let frontend = common::start_echo_backend("frontend").await;
    let gateway = common::start_gateway(frontend, api, |config| {
        config.timeouts.read = Duration::from_millis(200);
        config.timeouts.upload_read = Duration::from_secs(5);
    })
    .await;

    let upload = common::client().post(gateway.url("/api/upload")).body("data").send().await.unwrap();
    assert_eq!(upload.status(), StatusCode::OK);
    assert_eq!(upload.text().await.unwrap(), "stored");

    let regular = common::client().post(gateway.url("/api/files")).body("data").send().await.unwrap();
    assert_eq!(regular.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn upstream_errors_pass_through_untouched() {
    let api = common::start_programmable_backend(|| async { (503, "maintenance".into()) }).await;
    let frontend = common::start_echo_backend("frontend").await;
    let gateway = common::start_gateway(frontend, api, |_| {}).await;

    let response = common::client().get(gateway.url("/api/files")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.text().await.unwrap(), "maintenance");
}

#[tokio::test]
async fn client_cancellation_leaves_gateway_healthy() {
    let api = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        (200, "late".into())
    })
    .await;
    let frontend = common::start_echo_backend("frontend").await;
    let gateway = common::start_gateway(frontend, api, |_| {}).await;

    let impatient = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    assert!(impatient.get(gateway.url("/api/slow")).send().await.is_err());

    let response = common::client().get(gateway.url("/home")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn stalled_response_is_cut_at_write_deadline() {
    let api = common::start_stalling_backend().await;
    let frontend = common::start_echo_backend("frontend").await;
    let gateway = common::start_gateway(frontend, api, |config| {
        config.timeouts.write = Duration::from_millis(300);
    })
    .await;

    let response = common::client().get(gateway.url("/api/export")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = tokio::time::timeout(Duration::from_secs(5), response.bytes())
        .await
        .expect("write deadline should end the response");
    assert!(body.is_err());
}

#[tokio::test]
async fn idle_client_connections_are_closed() {
    let frontend = common::start_echo_backend("frontend").await;
    let api = common::start_echo_backend("api").await;
    let gateway = common::start_gateway(frontend, api, |config| {
        config.timeouts.idle = Duration::from_millis(300);
    })
    .await;

    let mut stream = TcpStream::connect(gateway.addr).await.unwrap();
    let mut buf = Vec::new();
    let closed = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf)).await;
    assert!(closed.is_ok(), "idle connection was kept open");
}

//! Outbound connection pools.
//!
//! # Responsibilities
//! - Own one pooled hyper client per upstream target
//! - Bound idle connections per host and evict them after the idle interval
//! - Enforce a per-host ceiling on in-flight exchanges
//!
//! # Design Decisions
//! - The ceiling permit lives inside the response body, so a slot is only freed
//!   once the body has been fully streamed (or dropped)
//! - Waiting for a slot counts against the request deadline

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::{Body, Bytes};
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::PoolConfig;

/// A pooled client plus its connection ceiling.
#[derive(Debug, Clone)]
pub struct UpstreamPool {
    client: Client<HttpConnector, Body>,
    slots: Arc<Semaphore>,
    max_connections: usize,
}

impl UpstreamPool {
    pub fn new(config: &PoolConfig, idle_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(idle_timeout)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build(connector);

        Self {
            client,
            slots: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        }
    }

    pub fn client(&self) -> &Client<HttpConnector, Body> {
        &self.client
    }

    /// Wait for a free connection slot.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.slots.clone().acquire_owned().await.ok()
    }

    #[cfg(test)]
    fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// Response body that holds a pool slot until it is exhausted or dropped.
#[derive(Debug)]
pub struct PermitBody<B> {
    inner: B,
    permit: Option<OwnedSemaphorePermit>,
}

impl<B> PermitBody<B> {
    pub fn new(inner: B, permit: OwnedSemaphorePermit) -> Self {
        Self {
            inner,
            permit: Some(permit),
        }
    }
}

impl<B> HttpBody for PermitBody<B>
where
    B: HttpBody<Data = Bytes> + Unpin,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let polled = Pin::new(&mut self.inner).poll_frame(cx);
        if let Poll::Ready(None) | Poll::Ready(Some(Err(_))) = polled {
            self.permit.take();
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

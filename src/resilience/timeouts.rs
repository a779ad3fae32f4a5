//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream exchanges and local file serving with a deadline
//! - Bound how long a response body may take to reach the client
//! - Cancel the wrapped future cleanly when the deadline elapses

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Bytes;
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use thiserror::Error;
use tokio::time::Sleep;

use crate::upstream::failure::BoxError;
use crate::upstream::ProxyFailure;

/// Run `fut`, turning an elapsed deadline into [`ProxyFailure::Timeout`].
pub async fn with_deadline<F, T>(deadline: Duration, fut: F) -> Result<T, ProxyFailure>
where
    F: Future<Output = Result<T, ProxyFailure>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProxyFailure::Timeout(deadline)),
    }
}

/// A response body was still streaming when the write deadline elapsed.
#[derive(Debug, Error)]
#[error("response not written within {0:?}")]
pub struct WriteTimeout(pub Duration);

/// Response body that fails once `deadline` has passed since it was created.
///
/// The failure aborts the client connection, which is the only way to stop a
/// response whose status line has already been sent.
#[derive(Debug)]
pub struct DeadlineBody<B> {
    inner: B,
    sleep: Pin<Box<Sleep>>,
    deadline: Duration,
}

impl<B> DeadlineBody<B> {
    pub fn new(inner: B, deadline: Duration) -> Self {
        Self {
            inner,
            sleep: Box::pin(tokio::time::sleep(deadline)),
            deadline,
        }
    }
}

impl<B> HttpBody for DeadlineBody<B>
where
    B: HttpBody<Data = Bytes> + Unpin,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        if let Poll::Ready(frame) = Pin::new(&mut this.inner).poll_frame(cx) {
            return Poll::Ready(frame.map(|result| result.map_err(Into::into)));
        }
        match this.sleep.as_mut().poll(cx) {
            Poll::Ready(()) => Poll::Ready(Some(Err(WriteTimeout(this.deadline).into()))),
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

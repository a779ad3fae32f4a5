//! Classification of failed upstream exchanges.

use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Coarse failure classification, used for logging and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Cancelled,
    ConnectionFailed,
    Timeout,
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Cancelled => "cancelled",
            FailureKind::ConnectionFailed => "connection_failed",
            FailureKind::Timeout => "timeout",
            FailureKind::Other => "other",
        }
    }
}

/// A failed forwarding attempt. Produced once by the forwarder, consumed once by
/// the error responder.
#[derive(Debug, Error)]
pub enum ProxyFailure {
    /// The client went away before the upstream answered.
    #[error("request cancelled before the upstream responded")]
    Cancelled,

    #[error("connection failed: {0}")]
    ConnectionFailed(#[source] BoxError),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("upstream request failed: {0}")]
    Other(#[source] BoxError),
}

impl ProxyFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProxyFailure::Cancelled => FailureKind::Cancelled,
            ProxyFailure::ConnectionFailed(_) => FailureKind::ConnectionFailed,
            ProxyFailure::Timeout(_) => FailureKind::Timeout,
            ProxyFailure::Other(_) => FailureKind::Other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == FailureKind::Cancelled
    }

    /// Classify an error returned by the pooled client.
    pub fn from_client_error(err: hyper_util::client::legacy::Error) -> Self {
        if is_cancellation(&err) {
            ProxyFailure::Cancelled
        } else if err.is_connect() {
            ProxyFailure::ConnectionFailed(Box::new(err))
        } else {
            ProxyFailure::Other(Box::new(err))
        }
    }
}

/// Walks the cause chain looking for a failure of the client's own request body.
///
/// A dropped client cancels the handler future before anything is classified,
/// so hyper's own "canceled" errors always mean the upstream connection died.
fn is_cancellation(err: &(dyn StdError + 'static)) -> bool {
    let mut cause = Some(err);
    while let Some(current) = cause {
        // Inbound bodies surface as `axum::Error`; an error there means the
        // client stopped sending, not that the upstream failed.
        if current.is::<axum::Error>() {
            return true;
        }
        cause = current.source();
    }
    false
}

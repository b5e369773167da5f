//! Upstream chat-completion port.
//!
//! The relay controller issues exactly one call per session through this
//! port. Implementations own the connection and enforce the call deadline
//! themselves; the controller never retries.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::UpstreamChatBody;
use crate::error::RelayError;
use crate::settings::ApiKey;

/// A read error on an open upstream body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct UpstreamStreamError(pub String);

/// Raw upstream body chunks, in arrival order.
///
/// Chunk boundaries are arbitrary; they need not align with event frames.
pub type UpstreamByteStream = BoxStream<'static, Result<Bytes, UpstreamStreamError>>;

/// Everything an implementation needs for one upstream request.
#[derive(Debug, Clone)]
pub struct UpstreamCall {
    pub api_key: ApiKey,
    pub body: UpstreamChatBody,
    /// Bound on reaching a response (status and headers).
    pub deadline: Duration,
    /// Cancelled when the relay session ends; an open body stream must stop.
    pub cancel: CancellationToken,
}

impl UpstreamCall {
    #[must_use]
    pub fn new(api_key: ApiKey, body: UpstreamChatBody, deadline: Duration) -> Self {
        Self {
            api_key,
            body,
            deadline,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        self.body.stream
    }
}

/// Successful upstream response.
pub enum UpstreamReply {
    /// Fully buffered body with a success status.
    Complete { status: u16, body: Bytes },
    /// Open body, already framed by upstream as an event stream.
    Streaming(UpstreamByteStream),
}

impl fmt::Debug for UpstreamReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete { status, body } => f
                .debug_struct("Complete")
                .field("status", status)
                .field("bytes", &body.len())
                .finish(),
            Self::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}

/// Why an upstream call produced no usable response.
///
/// Reachable-with-error-status and unreachable are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamFailure {
    #[error("Upstream returned HTTP {status}")]
    Http { status: u16, detail: String },

    #[error("Upstream unreachable: {0}")]
    Network(String),

    #[error("Upstream did not respond within {0:?}")]
    Timeout(Duration),
}

impl From<UpstreamFailure> for RelayError {
    fn from(failure: UpstreamFailure) -> Self {
        match failure {
            UpstreamFailure::Http { status, detail } => Self::UpstreamHttp { status, detail },
            UpstreamFailure::Network(detail) => Self::UpstreamNetwork(detail),
            UpstreamFailure::Timeout(deadline) => Self::UpstreamTimeout(deadline),
        }
    }
}

/// Port for the upstream chat-completion API.
#[async_trait]
pub trait UpstreamPort: Send + Sync + fmt::Debug {
    /// Issue one chat-completion request.
    ///
    /// With `call.body.stream == false` the implementation buffers the body
    /// and returns [`UpstreamReply::Complete`]. With `true` it returns as
    /// soon as headers arrive, handing back the open body.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamFailure` for non-success statuses (with the upstream
    /// body as detail), transport failures, and an expired deadline.
    async fn send(&self, call: UpstreamCall) -> Result<UpstreamReply, UpstreamFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_maps_to_relay_error() {
        let err: RelayError = UpstreamFailure::Timeout(Duration::from_secs(1)).into();
        assert_eq!(err.reason(), "timeout");

        let err: RelayError = UpstreamFailure::Network("refused".into()).into();
        assert_eq!(err.reason(), "fetch_failed");

        let err: RelayError = UpstreamFailure::Http {
            status: 401,
            detail: "bad key".into(),
        }
        .into();
        assert_eq!(err.suggested_status_code(), 401);
        assert_eq!(err.detail(), "bad key");
    }

    #[test]
    fn test_reply_debug_hides_body() {
        let reply = UpstreamReply::Complete {
            status: 200,
            body: Bytes::from_static(b"{\"secret\":1}"),
        };
        let debug = format!("{reply:?}");
        assert!(debug.contains("200"));
        assert!(!debug.contains("secret"));
    }
}

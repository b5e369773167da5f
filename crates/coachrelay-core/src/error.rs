//! Relay error taxonomy.
//!
//! Every failure a relay session can hit is one of these variants. Adapters
//! translate them into a client-visible payload: a JSON error body for the
//! non-streaming path or a synthetic event frame for the streaming path.

use std::time::Duration;

use thiserror::Error;

/// Coarse classification used for status selection and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or incomplete request. Never forwarded upstream.
    Client,
    /// The relay itself is misconfigured (missing credential).
    Configuration,
    /// Upstream was reachable and answered with a non-success status.
    UpstreamHttp,
    /// Upstream was unreachable or the connection dropped.
    UpstreamNetwork,
    /// A deadline expired while waiting on upstream.
    UpstreamTimeout,
}

/// Errors surfaced by the chat relay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),

    #[error("messages must be a non-empty array")]
    MessagesRequired,

    #[error("Invalid message at index {index}: {detail}")]
    InvalidMessage { index: usize, detail: String },

    #[error("Invalid field `{field}`: {detail}")]
    InvalidField { field: &'static str, detail: String },

    /// The upstream credential is not configured.
    #[error("Server is not configured with {0}")]
    MissingCredential(&'static str),

    /// Upstream answered with a non-success status. `detail` is its body, verbatim.
    #[error("Upstream returned HTTP {status}")]
    UpstreamHttp { status: u16, detail: String },

    #[error("Upstream request failed: {0}")]
    UpstreamNetwork(String),

    #[error("Upstream timeout after {}s", .0.as_secs_f64())]
    UpstreamTimeout(Duration),

    #[error("Upstream stream idle for {}s", .0.as_secs_f64())]
    UpstreamIdle(Duration),

    #[error("Relay session exceeded its {}s budget", .0.as_secs_f64())]
    SessionBudgetExceeded(Duration),

    #[error("Upstream stream interrupted: {0}")]
    StreamInterrupted(String),
}

impl RelayError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MethodNotAllowed(_)
            | Self::InvalidJson(_)
            | Self::MessagesRequired
            | Self::InvalidMessage { .. }
            | Self::InvalidField { .. } => ErrorKind::Client,
            Self::MissingCredential(_) => ErrorKind::Configuration,
            Self::UpstreamHttp { .. } => ErrorKind::UpstreamHttp,
            Self::UpstreamNetwork(_) | Self::StreamInterrupted(_) => ErrorKind::UpstreamNetwork,
            Self::UpstreamTimeout(_) | Self::UpstreamIdle(_) | Self::SessionBudgetExceeded(_) => {
                ErrorKind::UpstreamTimeout
            }
        }
    }

    /// Stable machine-readable reason, used as the `error` field on the wire.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed(_) => "method_not_allowed",
            Self::InvalidJson(_) => "invalid_json",
            Self::MessagesRequired => "messages_required",
            Self::InvalidMessage { .. } => "invalid_message",
            Self::InvalidField { .. } => "invalid_field",
            Self::MissingCredential(_) => "configuration_error",
            Self::UpstreamHttp { .. } => "upstream_error",
            Self::UpstreamNetwork(_) => "fetch_failed",
            Self::UpstreamTimeout(_) => "timeout",
            Self::UpstreamIdle(_) => "idle_timeout",
            Self::SessionBudgetExceeded(_) => "session_timeout",
            Self::StreamInterrupted(_) => "stream_interrupted",
        }
    }

    /// Returns a suggested HTTP status code for this error.
    ///
    /// Upstream HTTP errors keep the upstream status when it is a valid
    /// error status; anything else collapses to 502.
    #[must_use]
    pub const fn suggested_status_code(&self) -> u16 {
        match self {
            Self::MethodNotAllowed(_) => 405,
            Self::InvalidJson(_)
            | Self::MessagesRequired
            | Self::InvalidMessage { .. }
            | Self::InvalidField { .. } => 400,
            Self::MissingCredential(_) => 500,
            Self::UpstreamHttp { status, .. } => {
                if *status >= 400 && *status <= 599 {
                    *status
                } else {
                    502
                }
            }
            Self::UpstreamNetwork(_) | Self::StreamInterrupted(_) => 502,
            Self::UpstreamTimeout(_) | Self::UpstreamIdle(_) | Self::SessionBudgetExceeded(_) => {
                504
            }
        }
    }

    /// Diagnostic text for the client.
    ///
    /// Upstream error bodies are passed through untouched.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::UpstreamHttp { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }

    /// Upstream status, when the error carries one.
    #[must_use]
    pub const fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::UpstreamHttp { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Client)
    }
}

//! HTTP error mapping.
//!
//! Every failure that ends a request before a body is streamed is turned
//! into a JSON `{error, detail?, status?}` response here. CORS headers are
//! added by the route layers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use coachrelay_core::{ExtractError, RelayError};

/// Axum-side error type.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// Bad request outside the relay taxonomy (e.g. an unparsable upload body).
    #[error("{detail}")]
    BadRequest { reason: &'static str, detail: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Stable machine-readable reason
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    /// Upstream status, for upstream HTTP errors only
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
}

impl HttpError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        let code = match self {
            Self::Relay(err) => err.suggested_status_code(),
            Self::Extract(err) => err.suggested_status_code(),
            Self::BadRequest { .. } => 400,
            Self::Internal(_) => 500,
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY)
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::Relay(err) => ErrorBody {
                error: err.reason(),
                // The reason alone says everything for these
                detail: match err {
                    RelayError::MethodNotAllowed(_) | RelayError::MessagesRequired => None,
                    other => Some(other.detail()),
                },
                status: err.upstream_status(),
            },
            Self::Extract(err) => ErrorBody {
                error: err.reason(),
                detail: Some(err.to_string()),
                status: None,
            },
            Self::BadRequest { reason, detail } => ErrorBody {
                error: reason,
                detail: Some(detail.clone()),
                status: None,
            },
            Self::Internal(msg) => ErrorBody {
                error: "internal_error",
                detail: Some(msg.clone()),
                status: None,
            },
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status_code(), axum::Json(self.body())).into_response()
    }
}

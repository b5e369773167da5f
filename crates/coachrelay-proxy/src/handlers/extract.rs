//! Resume text extraction handler.

use axum::Json;
use axum::extract::State;
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tracing::warn;

use coachrelay_core::{ExtractionInput, RelayError};

use crate::error::HttpError;
use crate::server::AppState;

/// Largest accepted upload body.
pub const EXTRACT_BODY_LIMIT: usize = 40 * 1024 * 1024;

/// `POST /api/extract-text` with `{fileName, mimeType, dataBase64}`.
pub async fn extract_text(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        return HttpError::from(RelayError::MethodNotAllowed(method.to_string())).into_response();
    }

    let input: ExtractionInput = match serde_json::from_slice(&body) {
        Ok(input) => input,
        Err(e) => {
            return HttpError::BadRequest {
                reason: "invalid_json",
                detail: e.to_string(),
            }
            .into_response();
        }
    };

    match state.extractor.extract(&input).await {
        Ok(extracted) => Json(extracted).into_response(),
        Err(err) => {
            warn!(
                file_name = input.file_name.as_deref().unwrap_or_default(),
                mime_type = input.mime_type.as_deref().unwrap_or_default(),
                "Rejected extraction request: {err}"
            );
            HttpError::from(err).into_response()
        }
    }
}

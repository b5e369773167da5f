//! Industry and position taxonomy handler.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::debug;

use coachrelay_core::{RelayError, TaxonomyKind};

use crate::error::HttpError;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TaxonomyQuery {
    pub kind: Option<String>,
    pub industry: Option<String>,
}

/// `GET /api/taxonomy?kind=industries|positions&industry=<name>`
pub async fn lookup(
    State(state): State<AppState>,
    method: Method,
    query: Result<Query<TaxonomyQuery>, QueryRejection>,
) -> Response {
    if method != Method::GET {
        return HttpError::from(RelayError::MethodNotAllowed(method.to_string())).into_response();
    }
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            debug!(error = %rejection, "Rejected taxonomy query");
            return HttpError::BadRequest {
                reason: "invalid_query",
                detail: rejection.body_text(),
            }
            .into_response();
        }
    };

    let kind = TaxonomyKind::from_query(query.kind.as_deref(), query.industry.as_deref());
    match state.taxonomy.lookup(&kind).await {
        Ok(listing) => {
            debug!(?kind, source = ?listing.source(), count = listing.names().len(), "Taxonomy lookup");
            Json(listing).into_response()
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

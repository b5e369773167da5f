//! Router assembly and the `serve()` entry point.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{any, get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use coachrelay_core::{
    DeploymentProfile, RelaySettings, TaxonomyService, TextExtractionService, UpstreamPort,
};

use crate::cors::{Allow, with_cors};
use crate::handlers::{chat, extract, health, taxonomy};
use crate::relay::RelayController;

/// One relay per route shim.
#[derive(Debug, Clone)]
pub struct ChatRelays {
    /// Configured profile, served at `/api/deepseek/chat`.
    pub primary: RelayController,
    pub function: RelayController,
    pub edge: RelayController,
}

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub relays: ChatRelays,
    pub taxonomy: Arc<TaxonomyService>,
    pub extractor: Arc<TextExtractionService>,
}

/// Wire the relays and services around one upstream.
///
/// `primary` drives `/api/deepseek/chat` and the taxonomy lookup. The
/// function and edge shims use their own profile timing with the primary's
/// endpoint, credential and model.
pub fn build_state(
    primary: RelaySettings,
    upstream: Arc<dyn UpstreamPort>,
    extractor: TextExtractionService,
    shutdown: &CancellationToken,
) -> AppState {
    let primary = Arc::new(primary);
    let relay_for = |profile: DeploymentProfile| {
        let settings = if profile == primary.profile {
            Arc::clone(&primary)
        } else {
            Arc::new(RelaySettings::for_profile(profile).inherit_connection(&primary))
        };
        RelayController::new(settings, Arc::clone(&upstream)).with_shutdown(shutdown.clone())
    };

    let relays = ChatRelays {
        primary: RelayController::new(Arc::clone(&primary), Arc::clone(&upstream))
            .with_shutdown(shutdown.clone()),
        function: relay_for(DeploymentProfile::Function),
        edge: relay_for(DeploymentProfile::Edge),
    };

    AppState {
        relays,
        taxonomy: Arc::new(TaxonomyService::new(Arc::clone(&upstream), Arc::clone(&primary))),
        extractor: Arc::new(extractor),
    }
}

/// Build the router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Preflights stop at the CORS layer; every other method reaches the
        // handler, which rejects what it does not serve
        .route("/api/deepseek/chat", with_cors(any(chat::primary), Allow::Post))
        .route(
            "/.netlify/functions/deepseek-chat",
            with_cors(any(chat::function), Allow::Post),
        )
        .route("/deepseek-chat-edge", with_cors(any(chat::edge), Allow::Post))
        .route("/api/taxonomy", with_cors(any(taxonomy::lookup), Allow::Get))
        .route("/deepseek-taxonomy", with_cors(any(taxonomy::lookup), Allow::Get))
        .route(
            "/api/extract-text",
            with_cors(
                any(extract::extract_text).layer(DefaultBodyLimit::max(extract::EXTRACT_BODY_LIMIT)),
                Allow::Post,
            ),
        )
        .route("/api/health", with_cors(get(health::health), Allow::Get))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the relay server on a pre-bound listener until `cancel` fires.
///
/// Cancelling also ends every open streaming session with `[DONE]`, as long
/// as the relays were built with the same token.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(
        profile = %state.relays.primary.settings().profile,
        "Relay server listening on http://{addr}"
    );

    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    info!("Relay server shut down");
    Ok(())
}

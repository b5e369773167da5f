//! Serve command handler.
//!
//! Composition root for the server: settings, upstream client, services and
//! the shutdown token are wired here.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use coachrelay_core::{API_KEY_ENV, ApiKey, TextExtractionService};
use coachrelay_proxy::{HttpUpstream, build_state, serve};

use crate::commands::ServeArgs;

/// Execute the serve command.
///
/// Runs until Ctrl+C. Open streams are closed with `[DONE]` before the
/// server stops.
pub async fn execute(args: ServeArgs) -> Result<()> {
    let settings = args
        .to_settings()
        .context("Invalid relay settings")?
        .with_api_key(ApiKey::from_env());

    if settings.api_key.is_none() {
        warn!("{API_KEY_ENV} is not set; chat requests will be refused with a configuration error");
    }

    let upstream = HttpUpstream::new(settings.upstream_url.clone())
        .context("Failed to build upstream HTTP client")?;

    let addr = args.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        profile = %settings.profile,
        upstream = %settings.upstream_url,
        model = %settings.default_model,
        stream_default = settings.stream_default,
        "Starting relay"
    );

    let shutdown = CancellationToken::new();
    let state = build_state(
        settings,
        Arc::new(upstream),
        TextExtractionService::new(),
        &shutdown,
    );

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                signal.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {e}"),
        }
    });

    serve(listener, state, shutdown).await
}

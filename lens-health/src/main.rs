//! lens-health service entry point.

use anyhow::Result;
use lens_common::config::Config;
use lens_common::logging::init_logging;
use lens_health::{build_router, AppState, ChatNarrator};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

/// Largest accepted request body (ledger CSV uploads).
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();

    let config = Config::load_and_validate()?;
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Liquidity Lens health service v{}", env!("CARGO_PKG_VERSION"));

    let addr = config.bind_address();
    let narrator = ChatNarrator::from_config(&config.narrative)?;
    if config.narrative.enabled && narrator.is_none() {
        tracing::warn!("Narrative enabled but no endpoint configured; narration disabled");
    }

    let mut state = AppState::new(config);
    if let Some(narrator) = narrator {
        tracing::info!(model = %state.config.narrative.model, "Narrative service configured");
        state = state.with_narrator(Arc::new(narrator));
    }

    // Build router with CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = build_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors);

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

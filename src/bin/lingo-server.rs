use anyhow::{Context, Result};
use lingostream::api::GeminiClient;
use lingostream::config::Config;
use lingostream::server::{build_router, AppState};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load()?;
    config.validate()?;
    let addr = config.socket_addr()?;

    let upstream = Arc::new(GeminiClient::new(&config));
    let state = AppState::from_config(&config, upstream);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        %addr,
        model = %config.model,
        framing = ?config.framing,
        guest_suggestion_limit = config.guest_suggestion_limit,
        "lingo server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
        .context("server error")?;
    Ok(())
}

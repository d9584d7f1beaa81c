use std::sync::Arc;

use coach_server::app::{self, SessionRegistry};
use coach_server::config;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env();

    // Oracle for computer moves and coaching (falls back to offline play)
    let oracle = app::build_oracle(&config)?;
    tracing::info!(
        difficulty = %config.default_difficulty,
        thinking_delay = ?config.thinking_delay,
        idle_timeout = ?config.session_idle_timeout,
        "Session defaults"
    );

    let registry = Arc::new(SessionRegistry::new(oracle, &config));
    Arc::clone(&registry).spawn_idle_sweeper(config.session_idle_timeout);
    let app = app::router(registry, config.clone());

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

mod routes;
mod state;

use anyhow::{Context, Result};
use calarm_core::config::CalarmConfig;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("calarm_server=info,calarm_caldav=info,calarm_core=info")),
        )
        .init();

    let config = CalarmConfig::load().context("Failed to load calarm config")?;
    let state = AppState::new(&config)?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Could not bind {}", config.server.bind))?;
    info!(
        addr = %listener.local_addr()?,
        caldav = %config.caldav.calendar_url(),
        "calarm-server listening"
    );

    axum::serve(listener, app).await?;

    Ok(())
}

//! echo-gateway server entry point.
//!
//! Starts the Axum HTTP server with the health and WebSocket endpoints.

use tracing_subscriber::EnvFilter;

use echo_gateway::app_state::AppState;
use echo_gateway::config::GatewayConfig;
use echo_gateway::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    tracing::info!(
        addr = %config.listen_addr,
        origins = ?config.allowed_origins,
        "starting echo-gateway"
    );

    let listen_addr = config.listen_addr;
    let state = AppState::new(config);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = %listen_addr, "server listening");

    server::serve(listener, state).await?;

    Ok(())
}

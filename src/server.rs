//! Router assembly and serving.

use std::net::SocketAddr;

use axum::Router;
use axum::routing::any;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Builds the application router: `/health` plus the `/ws` upgrade
/// endpoint. `/ws` accepts any method so the handler itself can answer
/// non-GET requests with 405.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(api::build_router())
        .route("/ws", any(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the application on an already bound listener until the process
/// stops.
///
/// # Errors
///
/// Returns the I/O error that stopped the accept loop.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(
        listener,
        build_app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

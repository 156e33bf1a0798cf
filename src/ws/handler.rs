//! Axum WebSocket upgrade handler.
//!
//! The upgrade endpoint is the only authentication boundary: a request must
//! be a `GET` and carry an `Origin` from the configured allow-list before
//! the handshake is attempted.

use std::net::SocketAddr;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Method, Uri, header};
use axum::response::{IntoResponse, Response};

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::error::GatewayError;

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// Rejects other methods with 405 and a missing or foreign `Origin` with
/// 403. Accepted sockets are capped at `max_message_size` bytes per frame
/// and per message.
pub async fn ws_handler(
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if method != Method::GET {
        tracing::debug!(%method, remote = %remote_addr, "rejected non-GET upgrade");
        return GatewayError::MethodNotAllowed(method).into_response();
    }

    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !state.config.origin_allowed(origin) {
        tracing::warn!(
            origin = ?origin,
            path = %uri.path(),
            remote = %remote_addr,
            "blocked cross-origin websocket"
        );
        return GatewayError::OriginNotAllowed(origin.to_string()).into_response();
    }

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            tracing::warn!(remote = %remote_addr, error = %rejection, "upgrade error");
            return rejection.into_response();
        }
    };

    let limit = state.config.max_message_size;
    upgrade
        .max_message_size(limit)
        .max_frame_size(limit)
        .on_failed_upgrade(move |e| {
            tracing::warn!(remote = %remote_addr, error = %e, "upgrade error");
        })
        .on_upgrade(move |socket| run_connection(socket, state, remote_addr))
}

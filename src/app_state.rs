//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::domain::{ClientHub, MessageCounter};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Registry of live connections and broadcast fan-out.
    pub hub: ClientHub,
    /// Process-wide message id allocator.
    pub counter: Arc<MessageCounter>,
    /// Immutable gateway configuration.
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    /// Builds the state and spawns the hub coordinator.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            hub: ClientHub::spawn(config.hub_channel_capacity),
            counter: Arc::new(MessageCounter::new()),
            config: Arc::new(config),
        }
    }
}

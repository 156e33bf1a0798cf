//! Domain layer: connection identity, per-connection guards and the hub.
//!
//! This module contains the server-side state model: the identity of a
//! connection, the rate limiter and command history each connection owns,
//! the process-wide message counter, and the client hub that fans
//! broadcasts out to every live connection.

pub mod client_hub;
pub mod command_history;
pub mod connection_id;
pub mod message_counter;
pub mod rate_limiter;

pub use client_hub::{BroadcastMessage, ClientHub, OutboundSender};
pub use command_history::{CommandHistory, HistorySnapshot};
pub use connection_id::ConnectionId;
pub use message_counter::MessageCounter;
pub use rate_limiter::RateLimiter;

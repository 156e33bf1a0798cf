//! WebSocket layer: upgrade gate, connection lifecycle, message grammar.
//!
//! The WebSocket endpoint at `/ws` echoes, transforms or evaluates each
//! text message and fans `BROADCAST:` messages out through the client hub.

pub mod connection;
pub mod handler;
pub mod messages;

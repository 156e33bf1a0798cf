//! # echo-gateway
//!
//! WebSocket gateway that echoes, transforms and broadcasts text messages.
//!
//! After an origin-checked upgrade, every connection gets a rate limiter,
//! a short command history and a heartbeat. Text messages are classified
//! (`HISTORY`, `BROADCAST:`, `UPPER:`, `REVERSE:`, `{...}` arithmetic, or
//! plain echo) and answered with a process-wide sequence id.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, HTTP)
//!     │
//!     ├── Upgrade gate (ws/handler)
//!     ├── Connection: read loop · writer · heartbeat (ws/connection)
//!     │
//!     ├── RateLimiter · CommandHistory (domain/, per connection)
//!     ├── CommandProcessor (service/)
//!     │
//!     └── ClientHub coordinator · MessageCounter (domain/, process-wide)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod service;
pub mod ws;

//! Process-wide message sequence.

use std::sync::atomic::{AtomicU64, Ordering};

/// Allocates strictly increasing message ids, starting at 1, shared by
/// every connection.
///
/// Created once at startup and handed to each connection through
/// [`crate::app_state::AppState`].
#[derive(Debug, Default)]
pub struct MessageCounter(AtomicU64);

impl MessageCounter {
    /// Creates a counter whose first id is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Allocates the next id.
    pub fn next_id(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of ids allocated so far.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

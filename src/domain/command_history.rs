//! Bounded per-connection record of recently accepted commands.

use std::collections::VecDeque;

use serde::Serialize;
use tokio::sync::Mutex;

/// JSON shape returned for the `HISTORY` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistorySnapshot {
    /// Commands, oldest first.
    pub history: Vec<String>,
    /// Number of entries in `history`.
    pub count: usize,
}

/// FIFO ring of the last `max_size` commands a connection sent.
#[derive(Debug)]
pub struct CommandHistory {
    commands: Mutex<VecDeque<String>>,
    max_size: usize,
}

impl CommandHistory {
    /// Creates an empty history retaining at most `max_size` entries.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            commands: Mutex::new(VecDeque::new()),
            max_size,
        }
    }

    /// Appends a command, evicting the oldest entry when full.
    pub async fn add(&self, command: impl Into<String>) {
        if self.max_size == 0 {
            return;
        }
        let mut commands = self.commands.lock().await;
        while commands.len() >= self.max_size {
            commands.pop_front();
        }
        commands.push_back(command.into());
    }

    /// Returns an independent copy of the history, oldest first.
    pub async fn get_history(&self) -> Vec<String> {
        self.commands.lock().await.iter().cloned().collect()
    }

    /// Returns the history together with its length.
    pub async fn snapshot(&self) -> HistorySnapshot {
        let history = self.get_history().await;
        HistorySnapshot {
            count: history.len(),
            history,
        }
    }

    /// Renders [`Self::snapshot`] as the `{"history":[...],"count":N}` payload.
    pub async fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot().await)
            .unwrap_or_else(|_| r#"{"error":"failed to marshal history"}"#.to_string())
    }
}

//! Per-connection sliding-window message admission.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Sliding-window rate limiter owned by a single connection.
///
/// Keeps the instants of admitted messages in arrival order. Entries that
/// have aged past the window are purged before every admission check, so
/// the window slides continuously instead of resetting on a clock boundary.
#[derive(Debug)]
pub struct RateLimiter {
    timestamps: Mutex<VecDeque<Instant>>,
    max_messages: usize,
    window: Duration,
}

impl RateLimiter {
    /// Creates a limiter admitting `max_messages` per `window`.
    #[must_use]
    pub fn new(max_messages: usize, window: Duration) -> Self {
        Self {
            timestamps: Mutex::new(VecDeque::new()),
            max_messages,
            window,
        }
    }

    /// Atomically checks and records one message.
    ///
    /// Returns `false` without recording anything when the window is full.
    pub async fn allow_message(&self) -> bool {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock().await;

        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) < self.window {
                break;
            }
            timestamps.pop_front();
        }

        if timestamps.len() >= self.max_messages {
            return false;
        }
        timestamps.push_back(now);
        true
    }

    #[cfg(test)]
    async fn current_count(&self) -> usize {
        let now = Instant::now();
        self.timestamps
            .lock()
            .await
            .iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count()
    }

    /// Human-readable rejection reason sent back to the client.
    #[must_use]
    pub fn rejection_message(&self) -> String {
        let per = if self.window == Duration::from_secs(60) {
            "minute".to_string()
        } else {
            format!("{}s", self.window.as_secs())
        };
        format!(
            "rate limit exceeded: max {} messages per {per}",
            self.max_messages
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_past_capacity_is_rejected() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        for _ in 0..10 {
            assert!(limiter.allow_message().await);
        }
        assert!(!limiter.allow_message().await);
        assert_eq!(limiter.current_count().await, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides_after_expiry() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.allow_message().await);
        }
        assert!(!limiter.allow_message().await);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.allow_message().await);
        assert_eq!(limiter.current_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn only_stale_entries_are_purged() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.allow_message().await);
        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(limiter.allow_message().await);
        assert!(!limiter.allow_message().await);

        // First entry is now 61s old, second only 21s.
        tokio::time::advance(Duration::from_secs(21)).await;
        assert!(limiter.allow_message().await);
        assert!(!limiter.allow_message().await);
    }

    #[tokio::test]
    async fn rejected_calls_do_not_consume_capacity() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.allow_message().await);
        for _ in 0..5 {
            assert!(!limiter.allow_message().await);
        }
        assert_eq!(limiter.current_count().await, 1);
    }

    #[test]
    fn rejection_message_names_the_policy() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        assert_eq!(
            limiter.rejection_message(),
            "rate limit exceeded: max 10 messages per minute"
        );
        let limiter = RateLimiter::new(3, Duration::from_secs(5));
        assert_eq!(
            limiter.rejection_message(),
            "rate limit exceeded: max 3 messages per 5s"
        );
    }
}

//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Every knob has a default matching the
//! documented protocol limits, so an empty environment yields a working
//! server.

use std::net::SocketAddr;
use std::time::Duration;

/// Default origin allowed to open WebSocket connections.
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:4000";

/// Upper bound for every deadline and window read from the environment.
const MAX_DURATION_SECS: u64 = 24 * 60 * 60;

/// Upper bound for every count or capacity read from the environment.
const MAX_COUNT: usize = 1 << 20;

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:4000`).
    pub listen_addr: SocketAddr,

    /// Origins allowed to upgrade, compared case-insensitively.
    pub allowed_origins: Vec<String>,

    /// Maximum inbound message (and frame) size in bytes.
    pub max_message_size: usize,

    /// Read deadline: a connection with no inbound frame for this long is
    /// closed.
    pub idle_timeout: Duration,

    /// Deadline applied to every outbound frame.
    pub write_timeout: Duration,

    /// Messages admitted per connection within one rate-limit window.
    pub rate_limit_max_messages: usize,

    /// Length of the sliding rate-limit window.
    pub rate_limit_window: Duration,

    /// Number of commands retained in each connection's history.
    pub history_size: usize,

    /// Capacity of the hub coordinator's request queue.
    pub hub_channel_capacity: usize,

    /// Capacity of each connection's outbound frame queue.
    pub outbound_queue_capacity: usize,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set or cannot be
    /// parsed. Calls `dotenvy::dotenv().ok()` to optionally load a `.env`
    /// file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr: SocketAddr = match std::env::var("LISTEN_ADDR") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.listen_addr,
        };

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|raw| parse_origins(&raw))
            .filter(|origins| !origins.is_empty())
            .unwrap_or(defaults.allowed_origins);

        Ok(Self {
            listen_addr,
            allowed_origins,
            max_message_size: parse_env_count("WS_MAX_MESSAGE_BYTES", defaults.max_message_size),
            idle_timeout: parse_env_secs("WS_IDLE_TIMEOUT_SECS", defaults.idle_timeout),
            write_timeout: parse_env_secs("WS_WRITE_TIMEOUT_SECS", defaults.write_timeout),
            rate_limit_max_messages: parse_env_count(
                "RATE_LIMIT_MAX_MESSAGES",
                defaults.rate_limit_max_messages,
            ),
            rate_limit_window: parse_env_secs("RATE_LIMIT_WINDOW_SECS", defaults.rate_limit_window),
            history_size: parse_env_count("COMMAND_HISTORY_SIZE", defaults.history_size),
            hub_channel_capacity: parse_env_count(
                "HUB_CHANNEL_CAPACITY",
                defaults.hub_channel_capacity,
            ),
            outbound_queue_capacity: parse_env_count(
                "WS_OUTBOUND_QUEUE_CAPACITY",
                defaults.outbound_queue_capacity,
            ),
        })
    }

    /// Interval between unsolicited pings: nine tenths of the idle timeout,
    /// so a healthy peer always answers before the read deadline fires.
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        self.idle_timeout.saturating_mul(9) / 10
    }

    /// Returns `true` if `origin` case-insensitively matches an entry of the
    /// allow-list. An empty origin never matches.
    #[must_use]
    pub fn origin_allowed(&self, origin: &str) -> bool {
        !origin.is_empty()
            && self
                .allowed_origins
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(origin))
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 4000)),
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
            max_message_size: 4 * 1024,
            idle_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(5),
            rate_limit_max_messages: 10,
            rate_limit_window: Duration::from_secs(60),
            history_size: 5,
            hub_channel_capacity: 256,
            outbound_queue_capacity: 64,
        }
    }
}

/// Splits a comma separated origin list, trimming blanks.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses an environment variable as a count capped at [`MAX_COUNT`],
/// returning `default` on missing or invalid values.
fn parse_env_count(key: &str, default: usize) -> usize {
    parse_count(std::env::var(key).ok().as_deref(), default)
}

/// Parses an environment variable holding whole seconds, capped at
/// [`MAX_DURATION_SECS`]. Zero is rejected in favour of `default`.
fn parse_env_secs(key: &str, default: Duration) -> Duration {
    parse_secs(std::env::var(key).ok().as_deref(), default)
}

fn parse_count(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|v| v.trim().parse::<usize>().ok())
        .map_or(default, |count| count.min(MAX_COUNT))
}

fn parse_secs(raw: Option<&str>, default: Duration) -> Duration {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map_or(default, |secs| Duration::from_secs(secs.min(MAX_DURATION_SECS)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_limits() {
        let config = GatewayConfig::default();
        assert_eq!(config.max_message_size, 4096);
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.write_timeout, Duration::from_secs(5));
        assert_eq!(config.rate_limit_max_messages, 10);
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
        assert_eq!(config.history_size, 5);
    }

    #[test]
    fn ping_interval_is_ninety_percent_of_idle_timeout() {
        let config = GatewayConfig::default();
        assert_eq!(config.ping_interval(), Duration::from_secs(27));
    }

    #[test]
    fn origin_match_ignores_case() {
        let config = GatewayConfig::default();
        assert!(config.origin_allowed("http://localhost:4000"));
        assert!(config.origin_allowed("HTTP://LOCALHOST:4000"));
        assert!(!config.origin_allowed("http://evil.example"));
        assert!(!config.origin_allowed(""));
    }

    #[test]
    fn origin_list_is_trimmed() {
        let origins = parse_origins(" http://a.test , ,http://b.test,");
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn unset_variables_fall_back() {
        assert_eq!(parse_env_count("ECHO_GATEWAY_TEST_UNSET_NUMBER", 7), 7);
        assert_eq!(
            parse_env_secs("ECHO_GATEWAY_TEST_UNSET_SECS", Duration::from_secs(3)),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn invalid_values_fall_back() {
        assert_eq!(parse_count(Some("many"), 5), 5);
        assert_eq!(parse_secs(Some("0"), Duration::from_secs(30)), Duration::from_secs(30));
        assert_eq!(parse_secs(Some("-1"), Duration::from_secs(30)), Duration::from_secs(30));
        assert_eq!(parse_secs(Some(" 12 "), Duration::from_secs(30)), Duration::from_secs(12));
    }

    #[test]
    fn extreme_values_are_clamped() {
        let idle = parse_secs(Some("18446744073709551615"), Duration::from_secs(30));
        assert_eq!(idle, Duration::from_secs(MAX_DURATION_SECS));
        assert_eq!(parse_count(Some(&usize::MAX.to_string()), 5), MAX_COUNT);

        let config = GatewayConfig {
            idle_timeout: idle,
            ..GatewayConfig::default()
        };
        assert_eq!(
            config.ping_interval(),
            Duration::from_secs(MAX_DURATION_SECS * 9 / 10)
        );
    }

    #[test]
    fn ping_interval_saturates() {
        let config = GatewayConfig {
            idle_timeout: Duration::MAX,
            ..GatewayConfig::default()
        };
        assert!(config.ping_interval() > Duration::from_secs(MAX_DURATION_SECS));
    }
}

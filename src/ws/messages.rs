//! Text message grammar: command classification and string transforms.

use serde::Serialize;

/// Exact text that requests the connection's command history.
pub const HISTORY_COMMAND: &str = "HISTORY";
/// Prefix of a message to fan out to every other connection.
pub const BROADCAST_PREFIX: &str = "BROADCAST:";
/// Prefix of a message to upper-case.
pub const UPPER_PREFIX: &str = "UPPER:";
/// Prefix of a message to reverse.
pub const REVERSE_PREFIX: &str = "REVERSE:";

/// A client text message, classified in dispatch precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand<'a> {
    /// `HISTORY`
    History,
    /// `BROADCAST:<text>`, carrying `<text>`.
    Broadcast(&'a str),
    /// `UPPER:<text>`, carrying `<text>`.
    Upper(&'a str),
    /// `REVERSE:<text>`, carrying `<text>`.
    Reverse(&'a str),
    /// A payload starting with `{`, carrying the whole payload.
    Arithmetic(&'a str),
    /// Anything else.
    Echo(&'a str),
}

impl<'a> ClientCommand<'a> {
    /// Classifies a text payload. Earlier rules win.
    #[must_use]
    pub fn parse(text: &'a str) -> Self {
        if text == HISTORY_COMMAND {
            Self::History
        } else if let Some(rest) = text.strip_prefix(BROADCAST_PREFIX) {
            Self::Broadcast(rest)
        } else if let Some(rest) = text.strip_prefix(UPPER_PREFIX) {
            Self::Upper(rest)
        } else if let Some(rest) = text.strip_prefix(REVERSE_PREFIX) {
            Self::Reverse(rest)
        } else if text.starts_with('{') {
            Self::Arithmetic(text)
        } else {
            Self::Echo(text)
        }
    }
}

/// Upper-cases every code point.
#[must_use]
pub fn upper(text: &str) -> String {
    text.to_uppercase()
}

/// Reverses by code point, keeping multi-byte characters intact.
#[must_use]
pub fn reverse(text: &str) -> String {
    text.chars().rev().collect()
}

/// Text delivered to the other connections for `BROADCAST:<text>`.
#[must_use]
pub fn broadcast_line(remote_addr: &str, text: &str) -> String {
    format!("[BROADCAST from {remote_addr}] {text}")
}

/// Tags a response body with its message id: `#<id> <body>`.
#[must_use]
pub fn sequenced(id: u64, body: &str) -> String {
    format!("#{id} {body}")
}

/// Untagged in-band error payload, e.g. a rate-limit rejection.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    /// Failure description.
    pub error: String,
}

impl ErrorPayload {
    /// Renders `{"error":"<message>"}`.
    #[must_use]
    pub fn to_json(message: impl Into<String>) -> String {
        let payload = Self {
            error: message.into(),
        };
        serde_json::to_string(&payload).unwrap_or_else(|_| r#"{"error":"internal error"}"#.into())
    }
}

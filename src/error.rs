//! Gateway error types.
//!
//! [`GatewayError`] covers failures surfaced over plain HTTP before a
//! WebSocket exists; each variant maps to a status code and a structured
//! JSON body. [`ConnectionError`] describes why an established connection
//! was torn down and never leaves the connection task except as a log line.

use std::time::Duration;

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1002,
///     "message": "origin not allowed: http://evil.example"
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Handshake-time error with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category  | HTTP Status                     |
/// |-----------|-----------|---------------------------------|
/// | 1000–1999 | Handshake | 403 Forbidden / 405 Not Allowed |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The upgrade endpoint only accepts `GET`.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(Method),

    /// The `Origin` header is missing or not in the allow-list.
    #[error("origin not allowed: {0}")]
    OriginNotAllowed(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::MethodNotAllowed(_) => 1001,
            Self::OriginNotAllowed(_) => 1002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::OriginNotAllowed(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

/// Reason an established WebSocket connection stopped.
///
/// Every variant is fatal to the connection and is never retried.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// No frame (message or pong) arrived within the read deadline.
    #[error("no inbound frame within {0:?}")]
    IdleTimeout(Duration),

    /// A frame could not be queued for the writer before the deadline.
    #[error("write deadline of {0:?} exceeded")]
    WriteTimeout(Duration),

    /// The writer task stopped, so nothing more can reach the peer.
    #[error("outbound writer closed")]
    WriterClosed,

    /// The socket reported a read error (including oversized frames).
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn origin_rejection_is_forbidden() {
        let err = GatewayError::OriginNotAllowed("http://evil.example".to_string());
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.error_code(), 1002);
        assert_eq!(err.to_string(), "origin not allowed: http://evil.example");
    }

    #[test]
    fn method_rejection_is_not_allowed() {
        let err = GatewayError::MethodNotAllowed(Method::POST);
        assert_eq!(err.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.to_string(), "method not allowed: POST");
    }

    #[test]
    fn into_response_keeps_status() {
        let response = GatewayError::MethodNotAllowed(Method::PUT).into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn idle_timeout_mentions_deadline() {
        let err = ConnectionError::IdleTimeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "no inbound frame within 30s");
    }
}

//! # Gateway Error Types
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Transient        5xx, timeout, connect failure   → retry later         │
//! │  Rejected         4xx / business rejection        → roll back, no retry │
//! │  UnknownOrder     404 from the status check       → acknowledge         │
//! │  InvalidResponse  empty token, undecodable body   → roll back           │
//! │  InvalidSignature notification signature mismatch → 400                 │
//! │  MalformedNotification  undecodable callback body → 400                 │
//! │  Config           bad key / environment           → startup failure     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Gateway unavailable or too slow; the same call may succeed later.
    #[error("Gateway temporarily unavailable: {0}")]
    Transient(String),

    /// Gateway refused the request.
    #[error("Gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The gateway has no transaction for this order code.
    #[error("Gateway has no transaction for order {0}")]
    UnknownOrder(String),

    /// Response arrived but is unusable.
    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),

    /// Notification signature did not verify.
    #[error("Notification signature mismatch for order {0}")]
    InvalidSignature(String),

    /// Notification body could not be decoded.
    #[error("Malformed notification: {0}")]
    MalformedNotification(String),

    /// Client misconfiguration.
    #[error("Gateway configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Returns true if the same call may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Transient(_))
    }

    /// Maps an HTTP status plus message onto the error categories.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            500..=599 => GatewayError::Transient(format!("HTTP {}: {}", status, message)),
            _ => GatewayError::Rejected { status, message },
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            return GatewayError::Transient(err.to_string());
        }
        if err.is_decode() {
            return GatewayError::InvalidResponse(err.to_string());
        }
        match err.status() {
            Some(status) => GatewayError::from_status(status.as_u16(), err.to_string()),
            None => GatewayError::Transient(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::InvalidResponse(err.to_string())
    }
}

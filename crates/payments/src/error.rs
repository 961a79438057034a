//! Gateway error types.

use thiserror::Error;

/// Errors surfaced by the payment gateway boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A notification failed signature verification. Fails closed.
    #[error("notification failed verification: {0}")]
    Unauthenticated(String),

    /// The processor could not be reached (connect failure or timeout).
    #[error("payment gateway unreachable: {0}")]
    Unreachable(String),

    /// The processor reached us but declined the request.
    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),

    /// A response that does not match the expected wire contract.
    #[error("unexpected gateway response: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            GatewayError::Unreachable(err.to_string())
        } else {
            GatewayError::Protocol(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Protocol(err.to_string())
    }
}

/// Convenience alias for gateway results.
pub type Result<T> = std::result::Result<T, GatewayError>;

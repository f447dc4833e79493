//! Error types for the amora-link client.

use thiserror::Error;

/// Errors surfaced by the gateway client.
///
/// Only authentication and configuration problems (and the `connect()`
/// future itself) are returned to callers synchronously; transient
/// connection trouble is recovered internally and observable through the
/// health snapshot and the lifecycle event handlers.
#[derive(Error, Debug)]
pub enum AmoraLinkError {
    /// Missing or invalid credentials at connect time. Never retried.
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// Invalid client configuration (bad base URL, zero-capacity queue, ...).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Transport-level failure (handshake, send, unexpected close).
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// A deadline elapsed (connection establishment, most commonly).
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// A wire message could not be encoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type for gateway client operations.
pub type Result<T> = std::result::Result<T, AmoraLinkError>;

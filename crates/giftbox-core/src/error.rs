//! Error types for giftbox core operations.
//!
//! This module defines the error hierarchy for all core operations.
//! Errors are descriptive at the core level; the request-handling layer
//! maps these to status codes (Validation -> 400, Unauthorized -> 401,
//! Forbidden -> 403, NotFound -> 404).

use thiserror::Error;

/// Result type alias for giftbox operations.
pub type Result<T> = std::result::Result<T, GiftboxError>;

/// Core error type for giftbox operations.
#[derive(Debug, Error)]
pub enum GiftboxError {
    /// Bad or missing input (user-correctable)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing, invalid, or expired bearer token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not permitted
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authentication tag failure or malformed envelope on decrypt
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Encryption or key derivation error
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

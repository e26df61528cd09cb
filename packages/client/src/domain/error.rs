//! Errors surfaced through the domain seams.

use thiserror::Error;

/// REST API call failure.
///
/// Cloneable so one failure can be both logged and handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, refused connection, timeout).
    #[error("Request failed: {0}")]
    Request(String),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// `success: false` inside a 2xx envelope.
    #[error("Rejected by server: {0}")]
    Rejected(String),

    /// The backend no longer accepts the session token.
    #[error("Invalid token")]
    InvalidToken,

    /// `success: true` but the envelope carried no data.
    #[error("Response carried no data")]
    MissingData,

    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// No token is held locally.
    #[error("Not authenticated")]
    NotAuthenticated,
}

/// Local persistence failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage format error: {0}")]
    Format(#[from] serde_json::Error),
}

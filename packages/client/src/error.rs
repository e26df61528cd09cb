//! Error types for the client binary and session setup.

use thiserror::Error;

use crate::domain::{ApiError, StorageError};

/// Client-level errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

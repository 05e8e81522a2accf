// ABOUTME: Error types for durable state store operations.
// ABOUTME: Distinguishes "already exists" so callers can treat creates as idempotent.

use crate::exec::ExecError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("store command failed: {0}")]
    Command(#[from] ExecError),

    #[error("malformed store document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid label {key}={value}: {reason}")]
    InvalidLabel {
        key: String,
        value: String,
        reason: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

use client_console_schemas::Collection;
use thiserror::Error;

/// Failure reported by a remote store adapter.
///
/// Cloneable so a single failed read can be handed to every caller that was
/// waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The backend itself failed (connection, permissions, I/O)
    #[error("store backend error: {0}")]
    Backend(String),

    /// A uniqueness or integrity constraint rejected the write
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A row could not be encoded or decoded
    #[error("malformed row: {0}")]
    Decode(String),

    /// The HTTP endpoint answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// An update addressed a key that does not exist
    #[error("no {collection} row with key {key}")]
    MissingRow { collection: Collection, key: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint(message.unwrap_or_else(|| code.to_string()))
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => StoreError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None if err.is_decode() => StoreError::Decode(err.to_string()),
            None => StoreError::Backend(err.to_string()),
        }
    }
}

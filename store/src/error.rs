use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by block record stores.
///
/// "Not found" is never an error: lookups return `Ok(None)` or an empty
/// vector instead.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with the same hash is already stored.
    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),

    /// The caller's deadline elapsed before the backend answered. For
    /// writes the outcome is unknown: the write may still commit.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    /// Whether this is a uniqueness violation rather than an infrastructure failure.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate(_))
    }
}

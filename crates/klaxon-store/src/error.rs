use thiserror::Error;

/// Errors raised by a durable store backend.
///
/// Storage failures are never swallowed by higher layers — they propagate to
/// the host, which owns recovery (typically by restarting the partition).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure that does not fit the other variants.
    #[error("Backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

use thiserror::Error;

/// Errors surfaced by the scheduler.
///
/// Handler failures are deliberately absent: they are caught per task during
/// dispatch, recorded on the requeued record, and never surface past the
/// dispatcher.
#[derive(Debug, Error)]
pub enum AlarmError {
    /// The payload did not satisfy the configured schema. Raised
    /// synchronously at schedule time, before anything is written.
    #[error("Payload validation failed: {0}")]
    Validation(String),

    /// A task id could not be minted or decoded.
    #[error("Bad task id: {0}")]
    BadId(String),

    /// Durable I/O failure. Propagates to the host; already-committed
    /// writes stay committed.
    #[error("Storage error: {0}")]
    Storage(#[from] klaxon_store::StoreError),

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration file or environment override.
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AlarmError>;

//! Error types for the journal store and its operations.

use thiserror::Error;

/// Failures surfaced by the journal layer.
///
/// Degenerate arithmetic (zero stop distance, no losing trades) is never an
/// error; these variants cover persistence and bad user input only.
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("trade {0} does not exist")]
    TradeNotFound(i64),

    #[error("journal has not been initialized with a starting balance")]
    NotInitialized,

    #[error("journal is already initialized")]
    AlreadyInitialized,

    #[error("invalid value for {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("stored trade {id} is unreadable: {reason}")]
    CorruptRow { id: i64, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("csv export failed: {0}")]
    Export(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl JournalError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

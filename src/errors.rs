use thiserror::Error;

/// Error type that captures common ledger failures.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("record index {index} out of range (ledger holds {len} records)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("prompt error: {0}")]
    Prompt(String),
    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

use thiserror::Error;

/// Error type returned by all fallible operations in this crate.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("transaction state error: {0}")]
    TransactionState(String),

    #[error("transaction timed out")]
    TransactionTimedOut,

    #[error("writer busy")]
    WriterBusy,

    #[error("concurrent modification detected during iteration")]
    ConcurrentModification,
}

pub type Result<T> = std::result::Result<T, StoreError>;

use scylla::errors::{ExecutionError, NewSessionError, PrepareError};
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by the storage gateway.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage configuration error: {0}")]
    Config(String),
    #[error("failed to connect to storage: {0}")]
    Connect(#[from] NewSessionError),
    #[error("failed to prepare statement: {0}")]
    Prepare(#[from] PrepareError),
    #[error("query execution failed: {0}")]
    Execution(#[from] ExecutionError),
    #[error("failed to decode rows: {0}")]
    Rows(String),
    #[error("schema bootstrap failed: {0}")]
    Schema(String),
}

impl StorageError {
    pub fn rows(err: impl std::fmt::Display) -> Self {
        StorageError::Rows(err.to_string())
    }
}

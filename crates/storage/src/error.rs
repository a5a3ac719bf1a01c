//! Storage error types.

use thiserror::Error;
use zonal_stats::ZonalError;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Dataset names become table names and must be plain identifiers.
    #[error("invalid table name '{0}': expected lowercase letters, digits and underscores")]
    InvalidIdentifier(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for ZonalError {
    fn from(err: StorageError) -> Self {
        ZonalError::sink(err.to_string())
    }
}

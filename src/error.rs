//! Error types for wotledger

use std::fmt;

#[derive(Debug, Clone)]
pub enum LedgerError {
    NotFound(String),
    Inconsistent(String),
    ValidationFailure(String),
    StorageFailure(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LedgerError::NotFound(msg) => write!(f, "Not found: {}", msg),
            LedgerError::Inconsistent(msg) => write!(f, "Chain inconsistency: {}", msg),
            LedgerError::ValidationFailure(msg) => write!(f, "Validation failure: {}", msg),
            LedgerError::StorageFailure(msg) => write!(f, "Storage failure: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::StorageFailure(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::StorageFailure(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, LedgerError>;

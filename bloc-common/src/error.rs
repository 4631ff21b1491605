//! Common error types for bloc services

use thiserror::Error;

/// Common result type for bloc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across bloc services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested round, climber, boulder or climb does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation is not valid in the current state (no next round,
    /// start order collision, ...)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for SQLite busy/locked conditions that a retry can resolve
    pub fn is_lock_error(&self) -> bool {
        match self {
            Error::Database(db_err) => {
                let msg = db_err.to_string();
                msg.contains("database is locked") || msg.contains("database table is locked")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("round 7".to_string());
        assert_eq!(err.to_string(), "Not found: round 7");

        let err = Error::InvalidState("no next round".to_string());
        assert_eq!(err.to_string(), "Invalid state: no next round");
    }

    #[test]
    fn test_non_database_errors_are_not_lock_errors() {
        assert!(!Error::Internal("database is locked".to_string()).is_lock_error());
        assert!(!Error::Config("x".to_string()).is_lock_error());
    }
}

//! Error types for quire.

use thiserror::Error;

/// Result type alias using quire's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for quire operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No owner in scope. Raised before any store call.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Malformed input, rejected before any write.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Store-level failure not backed by sqlx
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Uniqueness constraint violated in the store
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Referenced note, bookmark, task or tag is absent in the caller's scope
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller exceeded the write budget of the current window
    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for every store-level failure (`PersistenceError` in the taxonomy).
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::Persistence(_) | Error::Conflict(_)
        )
    }

    /// True if the store reported a uniqueness violation.
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Conflict(_) => true,
            Error::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_authenticated() {
        assert_eq!(Error::NotAuthenticated.to_string(), "Not authenticated");
    }

    #[test]
    fn test_error_display_validation() {
        let err = Error::Validation("tag name cannot be empty".to_string());
        assert_eq!(
            err.to_string(),
            "Validation error: tag name cannot be empty"
        );
    }

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("note 42".to_string());
        assert_eq!(err.to_string(), "Not found: note 42");
    }

    #[test]
    fn test_error_display_rate_limited() {
        let err = Error::RateLimited {
            retry_after_secs: 7,
        };
        assert_eq!(err.to_string(), "Rate limited: retry after 7s");
    }

    #[test]
    fn test_persistence_grouping() {
        assert!(Error::Persistence("boom".to_string()).is_persistence());
        assert!(Error::Conflict("dup".to_string()).is_persistence());
        assert!(Error::Database(sqlx::Error::RowNotFound).is_persistence());
        assert!(!Error::NotAuthenticated.is_persistence());
        assert!(!Error::Validation("x".to_string()).is_persistence());
        assert!(!Error::NotFound("x".to_string()).is_persistence());
    }

    #[test]
    fn test_conflict_detection() {
        assert!(Error::Conflict("tag".to_string()).is_conflict());
        assert!(!Error::Database(sqlx::Error::RowNotFound).is_conflict());
        assert!(!Error::Persistence("tag".to_string()).is_conflict());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}

//! Domain error types
//!
//! Validation failures for sessions, triggers and the small value types
//! they are built from.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A time of day that is not a valid `HH:MM`
    #[error("Invalid time of day: {0}")]
    InvalidTime(String),

    /// A weekday name that is neither a weekday nor `daily`
    #[error("Invalid schedule day: {0}")]
    InvalidDay(String),

    /// An identifier that cannot be used as a session id
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// A trigger whose parameters are out of range
    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidTime("25:00".to_string());
        assert_eq!(err.to_string(), "Invalid time of day: 25:00");

        let err = DomainError::InvalidTrigger("interval must be positive".to_string());
        assert_eq!(err.to_string(), "Invalid trigger: interval must be positive");
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::InvalidDay("funday".to_string());
        let err2 = DomainError::InvalidDay("funday".to_string());
        let err3 = DomainError::InvalidDay("someday".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}

//! Error handling module
//!
//! Centralized error type for the command side and the saga worker.

use crate::domain::DomainError;
use crate::event_store::{EventStoreError, LogError};

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Business rule rejected the command
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LogError> for AppError {
    fn from(err: LogError) -> Self {
        AppError::EventStore(err.into())
    }
}

impl AppError {
    /// Another writer appended to the stream between load and save
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, AppError::EventStore(err) if err.is_concurrency_conflict())
    }

    /// Worth delivering again: conflicts and infrastructure failures.
    ///
    /// Domain rejections are deterministic, except a missing target
    /// aggregate, which another saga may still be about to register.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::EventStore(err) => err.is_retryable(),
            AppError::Domain(err) => matches!(err, DomainError::RegistrationRequired { .. }),
            AppError::Internal(_) => false,
        }
    }

    /// The command had already been applied earlier
    pub fn is_duplicate(&self) -> bool {
        matches!(self, AppError::Domain(err) if err.is_duplicate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_classification() {
        let conflict = AppError::from(EventStoreError::ConcurrencyConflict {
            stream: "account-x".to_string(),
            expected_version: 3,
        });
        assert!(conflict.is_concurrency_conflict());
        assert!(conflict.is_retryable());
        assert!(!conflict.is_duplicate());

        let duplicate = AppError::from(DomainError::AlreadyRegistered {
            aggregate: "account",
            id: Uuid::nil(),
        });
        assert!(duplicate.is_duplicate());
        assert!(!duplicate.is_retryable());

        let rejected = AppError::from(DomainError::MismatchedEndBalance {
            id: Uuid::nil(),
            balance: "1.00".to_string(),
            end_balance: "2.00".to_string(),
        });
        assert!(!rejected.is_retryable());

        let not_yet_registered = AppError::from(DomainError::RegistrationRequired {
            aggregate: "account month",
            id: Uuid::nil(),
        });
        assert!(not_yet_registered.is_retryable());

        let internal = AppError::Internal("boom".to_string());
        assert!(!internal.is_retryable());
        assert!(!internal.is_concurrency_conflict());
    }
}

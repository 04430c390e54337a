//! Event Store Errors
//!
//! Error types for event store operations.

use super::log::ExpectedRevision;

/// Errors raised by an external append-only log
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// Compare-and-append failed: the stream is not at the expected revision
    #[error("Wrong expected version for stream {stream}: expected {expected:?}, actual {actual:?}")]
    WrongExpectedVersion {
        stream: String,
        expected: ExpectedRevision,
        actual: Option<u64>,
    },

    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    #[error("Subscription group not found: {0}")]
    GroupNotFound(String),

    /// Connectivity or storage failure
    #[error("Event log transport error: {0}")]
    Transport(#[from] sqlx::Error),
}

/// Errors that can occur in the event store
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// Optimistic concurrency conflict
    #[error("Concurrency conflict on stream {stream}: expected version {expected_version}")]
    ConcurrencyConflict {
        stream: String,
        expected_version: i64,
    },

    /// Reading from a version past 1 of a stream that does not exist
    #[error("Stream not found: {stream}")]
    StreamNotFound { stream: String },

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Unknown command type: {0}")]
    UnknownCommandType(String),

    /// Registered type whose payload bytes do not decode
    #[error("Failed to decode {type_name}: {source}")]
    Decode {
        type_name: String,
        #[source]
        source: serde_json::Error,
    },

    /// Event decoded fine but belongs to another aggregate
    #[error("Event {event_type} on stream {stream} does not belong to aggregate {expected}")]
    EventTypeMismatch {
        stream: String,
        event_type: String,
        expected: &'static str,
    },

    #[error("Invalid stream name: {0}")]
    InvalidStreamName(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Log(#[from] LogError),
}

impl EventStoreError {
    /// Check if this error is a concurrency conflict
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, EventStoreError::ConcurrencyConflict { .. })
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EventStoreError::ConcurrencyConflict { .. }
                | EventStoreError::Log(LogError::Transport(_))
        )
    }
}

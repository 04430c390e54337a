//! External log port
//!
//! The event store adapter and the saga runtime only talk to the log
//! through these traits.

use async_trait::async_trait;

use super::{EventData, LogError, RecordedEvent};

/// Precondition for a compare-and-append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedRevision {
    /// Append unconditionally
    Any,
    /// The stream must not exist yet
    NoStream,
    /// The last event of the stream must be at this 0-based revision
    Exact(u64),
}

impl ExpectedRevision {
    /// Does a stream whose last revision is `current` satisfy the precondition?
    pub fn matches(&self, current: Option<u64>) -> bool {
        match self {
            ExpectedRevision::Any => true,
            ExpectedRevision::NoStream => current.is_none(),
            ExpectedRevision::Exact(revision) => current == Some(*revision),
        }
    }
}

/// Append-only log of per-stream event sequences
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append `events` atomically if `expected` holds.
    ///
    /// Returns the revision of the last appended event.
    async fn append_to_stream(
        &self,
        stream: &str,
        expected: ExpectedRevision,
        events: Vec<EventData>,
    ) -> Result<u64, LogError>;

    /// Read up to `max_count` events starting at `from_revision` (inclusive).
    ///
    /// Fails with [`LogError::StreamNotFound`] when the stream has no events.
    async fn read_stream(
        &self,
        stream: &str,
        from_revision: u64,
        max_count: usize,
    ) -> Result<Vec<RecordedEvent>, LogError>;
}

/// What to do with an event a consumer failed to process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackAction {
    /// Leave it unacknowledged; it is delivered again on the next receive
    Retry,
    /// Move it to the group's parked list and continue past it
    Park,
}

/// Durable consumer groups over the global log
#[async_trait]
pub trait PersistentSubscriptions: Send + Sync {
    /// Create the group if missing. Existing groups keep their checkpoint.
    async fn create_group(&self, group: &str, event_types: &[&str]) -> Result<(), LogError>;

    /// Events after the group's checkpoint, in global order, filtered by type
    async fn receive(&self, group: &str, max_count: usize) -> Result<Vec<RecordedEvent>, LogError>;

    async fn ack(&self, group: &str, position: u64) -> Result<(), LogError>;

    async fn nack(
        &self,
        group: &str,
        position: u64,
        action: NackAction,
        reason: &str,
    ) -> Result<(), LogError>;

    /// Global positions parked for the group, ascending
    async fn parked(&self, group: &str) -> Result<Vec<u64>, LogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_revision_matches() {
        assert!(ExpectedRevision::Any.matches(None));
        assert!(ExpectedRevision::Any.matches(Some(4)));

        assert!(ExpectedRevision::NoStream.matches(None));
        assert!(!ExpectedRevision::NoStream.matches(Some(0)));

        assert!(ExpectedRevision::Exact(2).matches(Some(2)));
        assert!(!ExpectedRevision::Exact(2).matches(Some(3)));
        assert!(!ExpectedRevision::Exact(0).matches(None));
    }
}

//! In-memory event log
//!
//! Single-process implementation of both log ports, used by tests and local
//! runs. One lock guards the whole log so appends are linearizable and
//! global positions follow commit order.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::log::{EventLog, ExpectedRevision, NackAction, PersistentSubscriptions};
use super::{EventData, LogError, RecordedEvent};

#[derive(Debug, Default)]
struct GroupState {
    event_types: HashSet<String>,
    checkpoint: u64,
    parked: BTreeSet<u64>,
}

#[derive(Debug, Default)]
struct LogState {
    /// Global log; `position` is index + 1
    all: Vec<RecordedEvent>,
    /// stream name -> indexes into `all`
    streams: HashMap<String, Vec<usize>>,
    groups: HashMap<String, GroupState>,
}

/// In-memory log. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventLog {
    state: Arc<RwLock<LogState>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events in the global log
    pub async fn len(&self) -> usize {
        self.state.read().await.all.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Every recorded event in global order
    pub async fn all_events(&self) -> Vec<RecordedEvent> {
        self.state.read().await.all.clone()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append_to_stream(
        &self,
        stream: &str,
        expected: ExpectedRevision,
        events: Vec<EventData>,
    ) -> Result<u64, LogError> {
        let mut state = self.state.write().await;

        let current = state
            .streams
            .get(stream)
            .and_then(|indexes| indexes.len().checked_sub(1))
            .map(|last| last as u64);

        if !expected.matches(current) {
            return Err(LogError::WrongExpectedVersion {
                stream: stream.to_string(),
                expected,
                actual: current,
            });
        }

        let mut revision = current.map(|last| last + 1).unwrap_or(0);
        let mut last_written = current;

        for event in events {
            let index = state.all.len();
            state.all.push(RecordedEvent {
                stream_id: stream.to_string(),
                revision,
                position: index as u64 + 1,
                event_type: event.event_type,
                content_type: event.content_type,
                data: event.data,
                metadata: event.metadata,
                created_at: event.created_at,
            });
            state
                .streams
                .entry(stream.to_string())
                .or_default()
                .push(index);

            last_written = Some(revision);
            revision += 1;
        }

        Ok(last_written.unwrap_or(0))
    }

    async fn read_stream(
        &self,
        stream: &str,
        from_revision: u64,
        max_count: usize,
    ) -> Result<Vec<RecordedEvent>, LogError> {
        let state = self.state.read().await;

        let indexes = state
            .streams
            .get(stream)
            .ok_or_else(|| LogError::StreamNotFound(stream.to_string()))?;

        Ok(indexes
            .iter()
            .skip(from_revision as usize)
            .take(max_count)
            .map(|&index| state.all[index].clone())
            .collect())
    }
}

#[async_trait]
impl PersistentSubscriptions for InMemoryEventLog {
    async fn create_group(&self, group: &str, event_types: &[&str]) -> Result<(), LogError> {
        let mut state = self.state.write().await;
        let entry = state.groups.entry(group.to_string()).or_default();
        entry.event_types = event_types.iter().map(|t| t.to_string()).collect();
        Ok(())
    }

    async fn receive(&self, group: &str, max_count: usize) -> Result<Vec<RecordedEvent>, LogError> {
        let state = self.state.read().await;
        let group_state = state
            .groups
            .get(group)
            .ok_or_else(|| LogError::GroupNotFound(group.to_string()))?;

        Ok(state
            .all
            .iter()
            .skip(group_state.checkpoint as usize)
            .filter(|event| group_state.event_types.contains(&event.event_type))
            .take(max_count)
            .cloned()
            .collect())
    }

    async fn ack(&self, group: &str, position: u64) -> Result<(), LogError> {
        let mut state = self.state.write().await;
        let group_state = state
            .groups
            .get_mut(group)
            .ok_or_else(|| LogError::GroupNotFound(group.to_string()))?;

        group_state.checkpoint = group_state.checkpoint.max(position);
        Ok(())
    }

    async fn nack(
        &self,
        group: &str,
        position: u64,
        action: NackAction,
        reason: &str,
    ) -> Result<(), LogError> {
        let mut state = self.state.write().await;
        let group_state = state
            .groups
            .get_mut(group)
            .ok_or_else(|| LogError::GroupNotFound(group.to_string()))?;

        match action {
            NackAction::Retry => {
                tracing::debug!(group, position, reason, "Event left for redelivery");
            }
            NackAction::Park => {
                group_state.parked.insert(position);
                group_state.checkpoint = group_state.checkpoint.max(position);
            }
        }

        Ok(())
    }

    async fn parked(&self, group: &str) -> Result<Vec<u64>, LogError> {
        let state = self.state.read().await;
        let group_state = state
            .groups
            .get(group)
            .ok_or_else(|| LogError::GroupNotFound(group.to_string()))?;

        Ok(group_state.parked.iter().copied().collect())
    }
}

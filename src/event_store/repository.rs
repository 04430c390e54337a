//! Event Store Repository
//!
//! Adapter between aggregates and the external log: versioned, paginated
//! per-aggregate streams with compare-and-append saves.
//!
//! Versions are 1-based (the first event of an aggregate is version 1);
//! log revisions are 0-based, so version `v` lives at revision `v - 1`.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::aggregate::{self, Aggregate};
use crate::domain::{DomainEvent, Event, EventPayload, OperationContext};

use super::envelope::{parse_stream_name, stream_name};
use super::log::{EventLog, ExpectedRevision};
use super::{EventData, EventStoreError, LogError, RecordedEvent, TypeRegistry};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Event Store for persisting and retrieving aggregate events
#[derive(Clone)]
pub struct EventStore {
    log: Arc<dyn EventLog>,
    registry: Arc<TypeRegistry>,
    batch_size: usize,
}

impl fmt::Debug for EventStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStore")
            .field("registry", &self.registry)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl EventStore {
    pub fn new(log: Arc<dyn EventLog>, registry: Arc<TypeRegistry>) -> Self {
        Self {
            log,
            registry,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Page size used when reading streams (at least 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    // =========================================================================
    // save
    // =========================================================================

    /// Append `events` to their aggregate's stream.
    ///
    /// `expected_version` is the aggregate version the events were produced
    /// from; 0 means the stream must not exist yet. All events must target
    /// the aggregate of `events[0]`.
    pub async fn save<A: Aggregate>(
        &self,
        events: &[Event<A::Event>],
        expected_version: i64,
    ) -> Result<(), EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(());
        };

        let stream = stream_name(A::aggregate_type(), first.aggregate_id);
        let expected = if expected_version <= 0 {
            ExpectedRevision::NoStream
        } else {
            ExpectedRevision::Exact((expected_version - 1) as u64)
        };

        let data = events
            .iter()
            .map(EventData::from_event)
            .collect::<Result<Vec<_>, _>>()?;

        match self.log.append_to_stream(&stream, expected, data).await {
            Ok(_) => {
                tracing::debug!(
                    stream = %stream,
                    expected_version,
                    count = events.len(),
                    "Events appended"
                );
                Ok(())
            }
            Err(LogError::WrongExpectedVersion { .. }) => {
                tracing::warn!(stream = %stream, expected_version, "Concurrency conflict on save");
                Err(EventStoreError::ConcurrencyConflict {
                    stream,
                    expected_version,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    // =========================================================================
    // load
    // =========================================================================

    /// Full history of an aggregate
    pub async fn load<A: Aggregate>(&self, id: Uuid) -> Result<Vec<Event<A::Event>>, EventStoreError> {
        self.load_from::<A>(id, 1).await
    }

    /// History starting at `version` (1-based, inclusive).
    ///
    /// A missing stream is an empty history when reading from version 1 and
    /// an error otherwise. Log infrastructure events are skipped but still
    /// count towards the page size.
    pub async fn load_from<A: Aggregate>(
        &self,
        id: Uuid,
        version: i64,
    ) -> Result<Vec<Event<A::Event>>, EventStoreError> {
        let version = version.max(1);
        let stream = stream_name(A::aggregate_type(), id);
        let mut from_revision = (version - 1) as u64;
        let mut events = Vec::new();

        loop {
            let batch = match self
                .log
                .read_stream(&stream, from_revision, self.batch_size)
                .await
            {
                Ok(batch) => batch,
                Err(LogError::StreamNotFound(_)) if version == 1 => return Ok(Vec::new()),
                Err(LogError::StreamNotFound(_)) => {
                    return Err(EventStoreError::StreamNotFound { stream })
                }
                Err(err) => return Err(err.into()),
            };

            let raw_count = batch.len();
            let last_revision = batch.last().map(|recorded| recorded.revision);

            for recorded in batch.iter().filter(|recorded| !recorded.is_system()) {
                events.push(self.decode_for::<A>(recorded)?);
            }

            match last_revision {
                Some(last) if raw_count >= self.batch_size => from_revision = last + 1,
                _ => break,
            }
        }

        Ok(events)
    }

    /// Current state of an aggregate; version 0 for an unknown id
    pub async fn load_aggregate<A: Aggregate>(&self, id: Uuid) -> Result<A, EventStoreError> {
        let history = self.load::<A>(id).await?;
        Ok(aggregate::replay(id, &history))
    }

    // =========================================================================
    // decoding
    // =========================================================================

    /// Decode any recorded domain event, whatever its aggregate
    pub fn decode_recorded(&self, recorded: &RecordedEvent) -> Result<Event<DomainEvent>, EventStoreError> {
        let (aggregate_type, aggregate_id) = parse_stream_name(&recorded.stream_id)
            .ok_or_else(|| EventStoreError::InvalidStreamName(recorded.stream_id.clone()))?;

        let data = self.registry.decode_event(&recorded.event_type, &recorded.data)?;
        let metadata = if recorded.metadata.is_empty() {
            OperationContext::default()
        } else {
            serde_json::from_slice(&recorded.metadata)?
        };

        Ok(Event {
            aggregate_type: aggregate_type.to_string(),
            aggregate_id,
            version: recorded.revision as i64 + 1,
            created_at: recorded.created_at,
            metadata,
            data,
        })
    }

    fn decode_for<A: Aggregate>(&self, recorded: &RecordedEvent) -> Result<Event<A::Event>, EventStoreError> {
        let event = self.decode_recorded(recorded)?;

        let data = A::Event::try_from(event.data).map_err(|other| EventStoreError::EventTypeMismatch {
            stream: recorded.stream_id.clone(),
            event_type: other.event_type().to_string(),
            expected: A::aggregate_type(),
        })?;

        Ok(Event {
            aggregate_type: event.aggregate_type,
            aggregate_id: event.aggregate_id,
            version: event.version,
            created_at: event.created_at,
            metadata: event.metadata,
            data,
        })
    }
}

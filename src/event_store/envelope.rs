//! Event envelope
//!
//! What the external log stores for each event: a type name, JSON payload
//! and metadata bytes, and the coordinates the log assigns on append.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Event, EventPayload};

/// Event types starting with this prefix belong to the log itself
pub const SYSTEM_EVENT_PREFIX: &str = "$";

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Event to append
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    pub event_type: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub metadata: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl EventData {
    pub fn json(
        event_type: impl Into<String>,
        data: Vec<u8>,
        metadata: Vec<u8>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            content_type: JSON_CONTENT_TYPE.to_string(),
            data,
            metadata,
            created_at,
        }
    }

    /// Serialize a domain event and its operation context
    pub fn from_event<E: EventPayload>(event: &Event<E>) -> Result<Self, serde_json::Error> {
        Ok(Self::json(
            event.event_type(),
            event.data.encode()?,
            serde_json::to_vec(&event.metadata)?,
            event.created_at,
        ))
    }
}

/// Event as read back from the log
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub stream_id: String,
    /// 0-based position inside the stream
    pub revision: u64,
    /// Position in the global log, starting at 1
    pub position: u64,
    pub event_type: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub metadata: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl RecordedEvent {
    pub fn is_system(&self) -> bool {
        self.event_type.starts_with(SYSTEM_EVENT_PREFIX)
    }
}

/// `"{aggregate_type}-{id}"`
pub fn stream_name(aggregate_type: &str, id: Uuid) -> String {
    format!("{}-{}", aggregate_type, id)
}

/// Split a stream name on its first `-` into aggregate type and id
pub fn parse_stream_name(stream: &str) -> Option<(&str, Uuid)> {
    let (aggregate_type, id) = stream.split_once('-')?;
    let id = id.parse().ok()?;
    Some((aggregate_type, id))
}

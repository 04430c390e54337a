//! Event Store module
//!
//! Persistence layer for Event Sourcing.
//! The [`EventStore`] adapter maps aggregate histories onto streams of an
//! external append-only log ([`EventLog`]); consumer groups over the same log
//! ([`PersistentSubscriptions`]) feed the sagas.

mod envelope;
mod error;
mod log;
mod memory;
mod postgres;
mod registry;
mod repository;

pub use envelope::{
    parse_stream_name, stream_name, EventData, RecordedEvent, JSON_CONTENT_TYPE,
    SYSTEM_EVENT_PREFIX,
};
pub use error::{EventStoreError, LogError};
pub use log::{EventLog, ExpectedRevision, NackAction, PersistentSubscriptions};
pub use memory::InMemoryEventLog;
pub use postgres::PgEventLog;
pub use registry::{CommandDecoder, EventDecoder, TypeRegistry, TypeRegistryBuilder};
pub use repository::{EventStore, DEFAULT_BATCH_SIZE};

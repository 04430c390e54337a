//! Type registry
//!
//! Maps wire type names to payload decoders. Built once at startup from the
//! aggregate modules and shared read-only afterwards.

use std::collections::HashMap;
use std::fmt;

use crate::domain::DomainEvent;
use crate::handlers::Command;

use super::EventStoreError;

pub type EventDecoder = fn(&[u8]) -> Result<DomainEvent, serde_json::Error>;
pub type CommandDecoder = fn(&[u8]) -> Result<Command, serde_json::Error>;

/// Immutable name -> decoder table for events and commands
pub struct TypeRegistry {
    events: HashMap<&'static str, EventDecoder>,
    commands: HashMap<&'static str, CommandDecoder>,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    pub fn decode_event(&self, type_name: &str, bytes: &[u8]) -> Result<DomainEvent, EventStoreError> {
        let decoder = self
            .events
            .get(type_name)
            .ok_or_else(|| EventStoreError::UnknownEventType(type_name.to_string()))?;

        decoder(bytes).map_err(|source| EventStoreError::Decode {
            type_name: type_name.to_string(),
            source,
        })
    }

    pub fn decode_command(&self, type_name: &str, bytes: &[u8]) -> Result<Command, EventStoreError> {
        let decoder = self
            .commands
            .get(type_name)
            .ok_or_else(|| EventStoreError::UnknownCommandType(type_name.to_string()))?;

        decoder(bytes).map_err(|source| EventStoreError::Decode {
            type_name: type_name.to_string(),
            source,
        })
    }

    pub fn has_event(&self, type_name: &str) -> bool {
        self.events.contains_key(type_name)
    }

    pub fn has_command(&self, type_name: &str) -> bool {
        self.commands.contains_key(type_name)
    }

    /// Registered event type names, sorted
    pub fn event_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.events.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("events", &self.events.len())
            .field("commands", &self.commands.len())
            .finish()
    }
}

#[derive(Default)]
pub struct TypeRegistryBuilder {
    events: HashMap<&'static str, EventDecoder>,
    commands: HashMap<&'static str, CommandDecoder>,
}

impl TypeRegistryBuilder {
    /// Register an event decoder.
    ///
    /// # Panics
    /// When `type_name` is already registered.
    pub fn event(mut self, type_name: &'static str, decoder: EventDecoder) -> Self {
        let previous = self.events.insert(type_name, decoder);
        assert!(previous.is_none(), "event type registered twice: {}", type_name);
        self
    }

    /// Register a command decoder.
    ///
    /// # Panics
    /// When `type_name` is already registered.
    pub fn command(mut self, type_name: &'static str, decoder: CommandDecoder) -> Self {
        let previous = self.commands.insert(type_name, decoder);
        assert!(previous.is_none(), "command type registered twice: {}", type_name);
        self
    }

    pub fn build(self) -> TypeRegistry {
        tracing::debug!(
            events = self.events.len(),
            commands = self.commands.len(),
            "Type registry built"
        );

        TypeRegistry {
            events: self.events,
            commands: self.commands,
        }
    }
}

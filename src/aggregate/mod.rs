//! Aggregate module
//!
//! Aggregate Root pattern implementation for Event Sourcing.
//!
//! An aggregate validates a command against its replayed state and answers
//! with the events to append; it never mutates itself while handling.
//! State only changes through [`Aggregate::apply`].

pub mod account;
pub mod account_month;
pub mod import_file;
pub mod movement_type;
pub mod tag_category;

use std::fmt;

use uuid::Uuid;

use crate::domain::{DomainError, DomainEvent, Event, EventPayload};
use crate::event_store::{TypeRegistry, TypeRegistryBuilder};

pub use account::Account;
pub use account_month::AccountMonth;
pub use import_file::ImportFile;
pub use movement_type::MovementType;
pub use tag_category::TagCategory;

/// Command addressed to a single aggregate instance
pub trait AggregateCommand: Clone + fmt::Debug + Send + Sync + 'static {
    /// Stable type name used by the registry and in logs
    fn command_type(&self) -> &'static str;

    /// Id of the aggregate instance the command targets
    fn aggregate_id(&self) -> Uuid;

    /// Registration commands create the aggregate and require an empty history
    fn is_registration(&self) -> bool;
}

/// Aggregate trait that all aggregates must implement
pub trait Aggregate: Sized + Clone + fmt::Debug + Send + Sync + 'static {
    /// Commands this aggregate accepts
    type Command: AggregateCommand;

    /// Events this aggregate emits and replays
    type Event: EventPayload + Into<DomainEvent> + TryFrom<DomainEvent, Error = DomainEvent>;

    /// Get the aggregate type name (stream prefix)
    fn aggregate_type() -> &'static str;

    /// Human readable name used in error messages
    fn label() -> &'static str;

    /// Empty aggregate at version 0
    fn new(id: Uuid) -> Self;

    /// Get the aggregate ID
    fn id(&self) -> Uuid;

    /// Get the current version (number of events applied)
    fn version(&self) -> i64;

    /// Validate a command against current state and produce event payloads.
    ///
    /// Only business rules live here; the registration guard is applied by
    /// [`execute`].
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, DomainError>;

    /// Apply an event to update the aggregate state.
    ///
    /// Pure fold step: increments the version by one.
    fn apply(self, event: &Event<Self::Event>) -> Self;
}

/// Run a command through the registration guard and the aggregate's rules.
///
/// A registration command needs version 0, every other command needs an
/// existing aggregate.
pub fn execute<A: Aggregate>(
    aggregate: &A,
    command: &A::Command,
) -> Result<Vec<A::Event>, DomainError> {
    if command.is_registration() {
        if aggregate.version() != 0 {
            return Err(DomainError::AlreadyRegistered {
                aggregate: A::label(),
                id: aggregate.id(),
            });
        }
    } else if aggregate.version() <= 0 {
        return Err(DomainError::RegistrationRequired {
            aggregate: A::label(),
            id: aggregate.id(),
        });
    }

    aggregate.handle(command)
}

/// Register every aggregate's event and command decoders
pub fn register_all(builder: TypeRegistryBuilder) -> TypeRegistryBuilder {
    let builder = account::register_commands(account::register_events(builder));
    let builder = account_month::register_commands(account_month::register_events(builder));
    let builder = import_file::register_commands(import_file::register_events(builder));
    let builder = movement_type::register_commands(movement_type::register_events(builder));
    tag_category::register_commands(tag_category::register_events(builder))
}

/// Registry with every type this crate knows about
pub fn type_registry() -> TypeRegistry {
    register_all(TypeRegistry::builder()).build()
}

/// Rebuild an aggregate by folding its history from version 0
pub fn replay<'a, A, I>(id: Uuid, history: I) -> A
where
    A: Aggregate,
    I: IntoIterator<Item = &'a Event<A::Event>>,
{
    history
        .into_iter()
        .fold(A::new(id), |aggregate, event| aggregate.apply(event))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers shared by the aggregate unit tests

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::domain::OperationContext;

    /// Run `command`, then apply the produced events in order
    pub fn run<A: Aggregate>(aggregate: A, command: A::Command) -> Result<A, DomainError> {
        let payloads = execute(&aggregate, &command)?;
        Ok(apply_all(aggregate, payloads))
    }

    pub fn apply_all<A: Aggregate>(aggregate: A, payloads: Vec<A::Event>) -> A {
        payloads.into_iter().fold(aggregate, |aggregate, data| {
            let event = stamped::<A>(aggregate.id(), aggregate.version() + 1, data);
            aggregate.apply(&event)
        })
    }

    pub fn stamped<A: Aggregate>(id: Uuid, version: i64, data: A::Event) -> Event<A::Event> {
        Event {
            aggregate_type: A::aggregate_type().to_string(),
            aggregate_id: id,
            version,
            created_at: Utc.with_ymd_and_hms(2023, 2, 1, 12, 0, 0).unwrap(),
            metadata: OperationContext::new(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::aggregate::movement_type::{MovementTypeCommand, RegisterNewMovementType};
    use crate::domain::MovementAction;

    fn register(id: Uuid) -> MovementTypeCommand {
        MovementTypeCommand::RegisterNewMovementType(RegisterNewMovementType {
            movement_type_id: id,
            action: MovementAction::Debit,
            account_id: Uuid::new_v4(),
            source_account_id: None,
            description: "Groceries".to_string(),
            notes: None,
            tag_ids: vec![],
        })
    }

    #[test]
    fn test_registration_guard_rejects_second_registration() {
        let id = Uuid::new_v4();
        let movement_type = run(MovementType::new(id), register(id)).unwrap();
        assert_eq!(movement_type.version(), 1);

        let result = execute(&movement_type, &register(id));

        assert_eq!(
            result,
            Err(DomainError::AlreadyRegistered {
                aggregate: "movement type",
                id
            })
        );
    }

    #[test]
    fn test_replay_sets_version_to_history_length() {
        let id = Uuid::new_v4();
        let payloads = execute(&MovementType::new(id), &register(id)).unwrap();
        let history: Vec<_> = payloads
            .into_iter()
            .enumerate()
            .map(|(i, data)| stamped::<MovementType>(id, i as i64 + 1, data))
            .collect();

        let movement_type: MovementType = replay(id, &history);

        assert_eq!(movement_type.version(), history.len() as i64);
        assert_eq!(movement_type.id(), id);
    }
}

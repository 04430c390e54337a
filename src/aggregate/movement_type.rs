//! MovementType Aggregate
//!
//! A reusable template for recurring ledger movements (rent, salary, a
//! transfer between two own accounts). Written once, never changed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::events::{NewMovementTypeRegisteredData, NEW_MOVEMENT_TYPE_REGISTERED};
use crate::domain::{DomainError, Event, MovementAction, MovementTypeEvent};
use crate::event_store::TypeRegistryBuilder;

use super::{Aggregate, AggregateCommand};

pub const AGGREGATE_TYPE: &str = "movementType";

pub const REGISTER_NEW_MOVEMENT_TYPE: &str = "register_new_movement_type";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterNewMovementType {
    pub movement_type_id: Uuid,
    pub action: MovementAction,
    pub account_id: Uuid,
    pub source_account_id: Option<Uuid>,
    pub description: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MovementTypeCommand {
    RegisterNewMovementType(RegisterNewMovementType),
}

impl AggregateCommand for MovementTypeCommand {
    fn command_type(&self) -> &'static str {
        match self {
            MovementTypeCommand::RegisterNewMovementType(_) => REGISTER_NEW_MOVEMENT_TYPE,
        }
    }

    fn aggregate_id(&self) -> Uuid {
        match self {
            MovementTypeCommand::RegisterNewMovementType(command) => command.movement_type_id,
        }
    }

    fn is_registration(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct MovementType {
    id: Uuid,
    action: Option<MovementAction>,
    account_id: Uuid,
    source_account_id: Option<Uuid>,
    description: String,
    version: i64,
}

impl MovementType {
    pub fn action(&self) -> Option<MovementAction> {
        self.action
    }

    pub fn account_id(&self) -> Uuid {
        self.account_id
    }

    pub fn source_account_id(&self) -> Option<Uuid> {
        self.source_account_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl Aggregate for MovementType {
    type Command = MovementTypeCommand;
    type Event = MovementTypeEvent;

    fn aggregate_type() -> &'static str {
        AGGREGATE_TYPE
    }

    fn label() -> &'static str {
        "movement type"
    }

    fn new(id: Uuid) -> Self {
        Self {
            id,
            action: None,
            account_id: Uuid::nil(),
            source_account_id: None,
            description: String::new(),
            version: 0,
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn handle(&self, command: &MovementTypeCommand) -> Result<Vec<MovementTypeEvent>, DomainError> {
        match command {
            MovementTypeCommand::RegisterNewMovementType(command) => {
                if command.source_account_id == Some(command.account_id) {
                    return Err(DomainError::SameSourceAccount {
                        id: command.movement_type_id,
                        account_id: command.account_id,
                    });
                }

                Ok(vec![MovementTypeEvent::NewMovementTypeRegistered(
                    NewMovementTypeRegisteredData {
                        movement_type_id: command.movement_type_id,
                        action: command.action,
                        account_id: command.account_id,
                        source_account_id: command.source_account_id,
                        description: command.description.clone(),
                        notes: command.notes.clone(),
                        tag_ids: command.tag_ids.clone(),
                    },
                )])
            }
        }
    }

    fn apply(mut self, event: &Event<MovementTypeEvent>) -> Self {
        match &event.data {
            MovementTypeEvent::NewMovementTypeRegistered(data) => {
                self.action = Some(data.action);
                self.account_id = data.account_id;
                self.source_account_id = data.source_account_id;
                self.description = data.description.clone();
            }
        }

        self.version += 1;
        self
    }
}

pub fn register_events(builder: TypeRegistryBuilder) -> TypeRegistryBuilder {
    builder.event(NEW_MOVEMENT_TYPE_REGISTERED, |bytes| {
        Ok(MovementTypeEvent::NewMovementTypeRegistered(serde_json::from_slice(bytes)?).into())
    })
}

pub fn register_commands(builder: TypeRegistryBuilder) -> TypeRegistryBuilder {
    builder.command(REGISTER_NEW_MOVEMENT_TYPE, |bytes| {
        Ok(MovementTypeCommand::RegisterNewMovementType(serde_json::from_slice(bytes)?).into())
    })
}

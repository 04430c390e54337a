//! Command definitions
//!
//! Commands represent intentions to change the system state. Each aggregate
//! owns its command enum; [`Command`] is the closed sum the dispatcher and
//! the type registry work with.

use uuid::Uuid;

use crate::aggregate::account::AccountCommand;
use crate::aggregate::account_month::AccountMonthCommand;
use crate::aggregate::import_file::ImportFileCommand;
use crate::aggregate::movement_type::MovementTypeCommand;
use crate::aggregate::tag_category::TagCategoryCommand;
use crate::aggregate::{self, AggregateCommand};

/// Any command the dispatcher accepts
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Account(AccountCommand),
    AccountMonth(AccountMonthCommand),
    ImportFile(ImportFileCommand),
    MovementType(MovementTypeCommand),
    TagCategory(TagCategoryCommand),
}

impl Command {
    pub fn command_type(&self) -> &'static str {
        match self {
            Command::Account(command) => command.command_type(),
            Command::AccountMonth(command) => command.command_type(),
            Command::ImportFile(command) => command.command_type(),
            Command::MovementType(command) => command.command_type(),
            Command::TagCategory(command) => command.command_type(),
        }
    }

    /// Stream prefix of the targeted aggregate
    pub fn aggregate_type(&self) -> &'static str {
        match self {
            Command::Account(_) => aggregate::account::AGGREGATE_TYPE,
            Command::AccountMonth(_) => aggregate::account_month::AGGREGATE_TYPE,
            Command::ImportFile(_) => aggregate::import_file::AGGREGATE_TYPE,
            Command::MovementType(_) => aggregate::movement_type::AGGREGATE_TYPE,
            Command::TagCategory(_) => aggregate::tag_category::AGGREGATE_TYPE,
        }
    }

    pub fn aggregate_id(&self) -> Uuid {
        match self {
            Command::Account(command) => command.aggregate_id(),
            Command::AccountMonth(command) => command.aggregate_id(),
            Command::ImportFile(command) => command.aggregate_id(),
            Command::MovementType(command) => command.aggregate_id(),
            Command::TagCategory(command) => command.aggregate_id(),
        }
    }

    pub fn is_registration(&self) -> bool {
        match self {
            Command::Account(command) => command.is_registration(),
            Command::AccountMonth(command) => command.is_registration(),
            Command::ImportFile(command) => command.is_registration(),
            Command::MovementType(command) => command.is_registration(),
            Command::TagCategory(command) => command.is_registration(),
        }
    }
}

macro_rules! command_conversions {
    ($($variant:ident($command:ty)),+ $(,)?) => {
        $(
            impl From<$command> for Command {
                fn from(command: $command) -> Self {
                    Command::$variant(command)
                }
            }
        )+
    };
}

command_conversions! {
    Account(AccountCommand),
    AccountMonth(AccountMonthCommand),
    ImportFile(ImportFileCommand),
    MovementType(MovementTypeCommand),
    TagCategory(TagCategoryCommand),
}

//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;
use uuid::Uuid;

/// Business rule violations raised while handling a command.
///
/// Every variant carries the ids and the current vs. expected values a
/// caller needs to render a message. They are never retried automatically.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Registration command sent to an aggregate that already has history
    #[error("{aggregate}: is already registered. Id: {id}")]
    AlreadyRegistered { aggregate: &'static str, id: Uuid },

    /// Non-registration command sent to an aggregate with no history
    #[error("{aggregate}: needs to be registered first. Id: {id}")]
    RegistrationRequired { aggregate: &'static str, id: Uuid },

    /// Import file is not in a state that allows the operation
    #[error("importfile: invalid state for {operation}. Id: {id}, State: {state}")]
    InvalidFileState {
        id: Uuid,
        operation: &'static str,
        state: String,
    },

    #[error("importfile: data row has already been added. Id: {id}, DataRowId: {data_row_id}")]
    DuplicateDataRow { id: Uuid, data_row_id: Uuid },

    /// Row missing, or not in the sub-state the operation requires
    #[error(
        "importfile: data row was not imported or is in an invalid state for {operation}. \
         Id: {id}, DataRowId: {data_row_id}, Exists: {exists}, State: {state}"
    )]
    DataRowStateMismatch {
        id: Uuid,
        operation: &'static str,
        data_row_id: Uuid,
        exists: bool,
        state: String,
    },

    #[error("account month: mismatched active month. Id: {id}, Account: {active}, NewMovement: {movement}")]
    MismatchedActiveMonth {
        id: Uuid,
        active: String,
        movement: String,
    },

    #[error("account month: end of month balance is different. Id: {id}, Account: {balance}, EndOfMonth: {end_balance}")]
    MismatchedEndBalance {
        id: Uuid,
        balance: String,
        end_balance: String,
    },

    #[error("account month: already ended. Id: {id}")]
    AccountMonthAlreadyEnded { id: Uuid },

    #[error("account month: movement amount must not be negative. Id: {id}, MovementId: {movement_id}, Amount: {amount}")]
    NegativeMovementAmount {
        id: Uuid,
        movement_id: Uuid,
        amount: String,
    },

    /// The movement would push the running balance out of range
    #[error("account month: balance overflow. Id: {id}, Account: {balance}, MovementId: {movement_id}")]
    BalanceOverflow {
        id: Uuid,
        balance: String,
        movement_id: Uuid,
    },

    #[error("account month: movement has already been registered. Id: {id}, MovementId: {movement_id}")]
    DuplicateAccountMovement { id: Uuid, movement_id: Uuid },

    #[error("movement type: account and source account cannot be the same. Id: {id}, AccountId: {account_id}")]
    SameSourceAccount { id: Uuid, account_id: Uuid },

    #[error("tag category: tag already exists. Id: {id}, TagId: {tag_id}")]
    DuplicateTag { id: Uuid, tag_id: Uuid },

    #[error("tag category: tag name already exists. Id: {id}, Name: {name}")]
    DuplicateTagName { id: Uuid, name: String },
}

impl DomainError {
    /// True when a registration command hit an existing aggregate.
    ///
    /// Saga handlers use this to recognise a redelivered command.
    pub fn is_already_registered(&self) -> bool {
        matches!(self, Self::AlreadyRegistered { .. })
    }

    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::AlreadyRegistered { .. } | Self::DuplicateAccountMovement { .. }
        )
    }

    /// Check if the command was already applied earlier (safe to treat as done)
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRegistered { .. }
                | Self::DuplicateAccountMovement { .. }
                | Self::DuplicateDataRow { .. }
        )
    }
}

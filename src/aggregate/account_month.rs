//! AccountMonth Aggregate
//!
//! The ledger of one account for one calendar month. It opens with the
//! previous month's closing balance, accumulates movements dated inside the
//! month, and closes once the declared end balance matches the running one.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::events::{
    AccountMonthEndedData, AccountMonthStartedData, NewAccountMovementRegisteredData,
    ACCOUNT_MONTH_ENDED, ACCOUNT_MONTH_STARTED, NEW_ACCOUNT_MOVEMENT_REGISTERED,
};
use crate::domain::{
    AccountMonthEvent, ActiveMonth, DomainError, Event, Money, MovementAction,
};
use crate::event_store::TypeRegistryBuilder;

use super::{Aggregate, AggregateCommand};

pub const AGGREGATE_TYPE: &str = "accountMonth";

pub const START_ACCOUNT_MONTH: &str = "start_account_month";
pub const REGISTER_NEW_ACCOUNT_MOVEMENT: &str = "register_new_account_movement";
pub const END_ACCOUNT_MONTH: &str = "end_account_month";

// =========================================================================
// Commands
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartAccountMonth {
    pub account_month_id: Uuid,
    pub account_id: Uuid,
    pub start_balance: Money,
    pub month: ActiveMonth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterNewAccountMovement {
    pub account_month_id: Uuid,
    pub account_movement_id: Uuid,
    pub movement_type_id: Option<Uuid>,
    pub action: MovementAction,
    /// Non-negative amount; `action` gives the direction
    pub amount: Money,
    pub date: DateTime<Utc>,
    pub source_account_id: Option<Uuid>,
    pub description: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndAccountMonth {
    pub account_month_id: Uuid,
    pub account_id: Uuid,
    pub end_balance: Money,
    pub month: ActiveMonth,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccountMonthCommand {
    StartAccountMonth(StartAccountMonth),
    RegisterNewAccountMovement(RegisterNewAccountMovement),
    EndAccountMonth(EndAccountMonth),
}

impl AggregateCommand for AccountMonthCommand {
    fn command_type(&self) -> &'static str {
        match self {
            AccountMonthCommand::StartAccountMonth(_) => START_ACCOUNT_MONTH,
            AccountMonthCommand::RegisterNewAccountMovement(_) => REGISTER_NEW_ACCOUNT_MOVEMENT,
            AccountMonthCommand::EndAccountMonth(_) => END_ACCOUNT_MONTH,
        }
    }

    fn aggregate_id(&self) -> Uuid {
        match self {
            AccountMonthCommand::StartAccountMonth(command) => command.account_month_id,
            AccountMonthCommand::RegisterNewAccountMovement(command) => command.account_month_id,
            AccountMonthCommand::EndAccountMonth(command) => command.account_month_id,
        }
    }

    fn is_registration(&self) -> bool {
        matches!(self, AccountMonthCommand::StartAccountMonth(_))
    }
}

// =========================================================================
// Aggregate
// =========================================================================

#[derive(Debug, Clone)]
pub struct AccountMonth {
    id: Uuid,
    account_id: Uuid,
    month: Option<ActiveMonth>,
    start_balance: Money,
    /// Running balance: start + credits - debits
    balance: Money,
    movements: HashSet<Uuid>,
    ended: bool,
    version: i64,
}

impl AccountMonth {
    pub fn account_id(&self) -> Uuid {
        self.account_id
    }

    pub fn month(&self) -> Option<ActiveMonth> {
        self.month
    }

    pub fn start_balance(&self) -> Money {
        self.start_balance
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn has_movement(&self, movement_id: Uuid) -> bool {
        self.movements.contains(&movement_id)
    }

    fn require_month(&self) -> Result<ActiveMonth, DomainError> {
        self.month.ok_or(DomainError::RegistrationRequired {
            aggregate: Self::label(),
            id: self.id,
        })
    }

    fn register_movement(
        &self,
        command: &RegisterNewAccountMovement,
    ) -> Result<AccountMonthEvent, DomainError> {
        let month = self.require_month()?;

        if self.ended {
            return Err(DomainError::AccountMonthAlreadyEnded { id: self.id });
        }

        if self.movements.contains(&command.account_movement_id) {
            return Err(DomainError::DuplicateAccountMovement {
                id: self.id,
                movement_id: command.account_movement_id,
            });
        }

        if !month.contains(&command.date) {
            return Err(DomainError::MismatchedActiveMonth {
                id: self.id,
                active: month.to_string(),
                movement: ActiveMonth::of(&command.date).to_string(),
            });
        }

        if command.amount.is_negative() {
            return Err(DomainError::NegativeMovementAmount {
                id: self.id,
                movement_id: command.account_movement_id,
                amount: command.amount.to_string(),
            });
        }

        command
            .action
            .signed(command.amount)
            .and_then(|delta| self.balance.checked_add(delta))
            .ok_or_else(|| DomainError::BalanceOverflow {
                id: self.id,
                balance: self.balance.to_string(),
                movement_id: command.account_movement_id,
            })?;

        Ok(AccountMonthEvent::NewAccountMovementRegistered(
            NewAccountMovementRegisteredData {
                account_month_id: self.id,
                account_movement_id: command.account_movement_id,
                movement_type_id: command.movement_type_id,
                action: command.action,
                amount: command.amount,
                date: command.date,
                source_account_id: command.source_account_id,
                description: command.description.clone(),
                notes: command.notes.clone(),
                tag_ids: command.tag_ids.clone(),
            },
        ))
    }

    fn end(&self, command: &EndAccountMonth) -> Result<AccountMonthEvent, DomainError> {
        let month = self.require_month()?;

        if self.ended {
            return Err(DomainError::AccountMonthAlreadyEnded { id: self.id });
        }

        if command.end_balance != self.balance {
            return Err(DomainError::MismatchedEndBalance {
                id: self.id,
                balance: self.balance.to_string(),
                end_balance: command.end_balance.to_string(),
            });
        }

        Ok(AccountMonthEvent::MonthEnded(AccountMonthEndedData {
            account_month_id: self.id,
            account_id: self.account_id,
            end_balance: command.end_balance,
            month,
        }))
    }
}

impl Aggregate for AccountMonth {
    type Command = AccountMonthCommand;
    type Event = AccountMonthEvent;

    fn aggregate_type() -> &'static str {
        AGGREGATE_TYPE
    }

    fn label() -> &'static str {
        "account month"
    }

    fn new(id: Uuid) -> Self {
        Self {
            id,
            account_id: Uuid::nil(),
            month: None,
            start_balance: Money::zero(),
            balance: Money::zero(),
            movements: HashSet::new(),
            ended: false,
            version: 0,
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn handle(&self, command: &AccountMonthCommand) -> Result<Vec<AccountMonthEvent>, DomainError> {
        let event = match command {
            AccountMonthCommand::StartAccountMonth(command) => {
                AccountMonthEvent::MonthStarted(AccountMonthStartedData {
                    account_month_id: command.account_month_id,
                    account_id: command.account_id,
                    start_balance: command.start_balance,
                    month: command.month,
                })
            }
            AccountMonthCommand::RegisterNewAccountMovement(command) => {
                self.register_movement(command)?
            }
            AccountMonthCommand::EndAccountMonth(command) => self.end(command)?,
        };

        Ok(vec![event])
    }

    fn apply(mut self, event: &Event<AccountMonthEvent>) -> Self {
        match &event.data {
            AccountMonthEvent::MonthStarted(data) => {
                self.account_id = data.account_id;
                self.month = Some(data.month);
                self.start_balance = data.start_balance;
                self.balance = data.start_balance;
            }

            AccountMonthEvent::NewAccountMovementRegistered(data) => {
                let delta = data.action.signed(data.amount).unwrap_or_default();
                self.balance = self.balance.saturating_add(delta);
                self.movements.insert(data.account_movement_id);
            }

            AccountMonthEvent::MonthEnded(_) => {
                self.ended = true;
            }
        }

        self.version += 1;
        self
    }
}

// =========================================================================
// Registry
// =========================================================================

pub fn register_events(builder: TypeRegistryBuilder) -> TypeRegistryBuilder {
    builder
        .event(ACCOUNT_MONTH_STARTED, |bytes| {
            Ok(AccountMonthEvent::MonthStarted(serde_json::from_slice(bytes)?).into())
        })
        .event(NEW_ACCOUNT_MOVEMENT_REGISTERED, |bytes| {
            Ok(AccountMonthEvent::NewAccountMovementRegistered(serde_json::from_slice(bytes)?).into())
        })
        .event(ACCOUNT_MONTH_ENDED, |bytes| {
            Ok(AccountMonthEvent::MonthEnded(serde_json::from_slice(bytes)?).into())
        })
}

pub fn register_commands(builder: TypeRegistryBuilder) -> TypeRegistryBuilder {
    builder
        .command(START_ACCOUNT_MONTH, |bytes| {
            Ok(AccountMonthCommand::StartAccountMonth(serde_json::from_slice(bytes)?).into())
        })
        .command(REGISTER_NEW_ACCOUNT_MOVEMENT, |bytes| {
            Ok(AccountMonthCommand::RegisterNewAccountMovement(serde_json::from_slice(bytes)?).into())
        })
        .command(END_ACCOUNT_MONTH, |bytes| {
            Ok(AccountMonthCommand::EndAccountMonth(serde_json::from_slice(bytes)?).into())
        })
}

//! Account Aggregate
//!
//! A bank account whose ledger is kept month by month. The account only
//! tracks which month is currently open; balances live in the ledger months.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::events::{
    NewAccountRegisteredData, NextMonthStartedData, NEW_ACCOUNT_REGISTERED, NEXT_MONTH_STARTED,
};
use crate::domain::{
    AccountEvent, AccountType, ActiveMonth, BankName, Currency, DomainError, Event, Money,
};
use crate::event_store::TypeRegistryBuilder;

use super::{Aggregate, AggregateCommand};

pub const AGGREGATE_TYPE: &str = "account";

pub const REGISTER_NEW_ACCOUNT: &str = "register_new_account";
pub const START_NEXT_MONTH: &str = "start_next_month";

// =========================================================================
// Commands
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterNewAccount {
    pub account_id: Uuid,
    pub bank_name: BankName,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub starting_balance: Money,
    pub starting_balance_date: DateTime<Utc>,
    pub currency: Currency,
    pub notes: Option<String>,
}

/// Close the active month and open the following one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartNextMonth {
    pub account_id: Uuid,
    pub balance: Money,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccountCommand {
    RegisterNewAccount(RegisterNewAccount),
    StartNextMonth(StartNextMonth),
}

impl AggregateCommand for AccountCommand {
    fn command_type(&self) -> &'static str {
        match self {
            AccountCommand::RegisterNewAccount(_) => REGISTER_NEW_ACCOUNT,
            AccountCommand::StartNextMonth(_) => START_NEXT_MONTH,
        }
    }

    fn aggregate_id(&self) -> Uuid {
        match self {
            AccountCommand::RegisterNewAccount(command) => command.account_id,
            AccountCommand::StartNextMonth(command) => command.account_id,
        }
    }

    fn is_registration(&self) -> bool {
        matches!(self, AccountCommand::RegisterNewAccount(_))
    }
}

// =========================================================================
// Aggregate
// =========================================================================

/// Account Aggregate
///
/// State is derived from events, never directly mutated.
#[derive(Debug, Clone)]
pub struct Account {
    id: Uuid,
    name: String,
    bank_name: Option<BankName>,
    currency: Option<Currency>,
    starting_balance: Money,
    active_month: Option<ActiveMonth>,
    version: i64,
}

impl Account {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bank_name(&self) -> Option<BankName> {
        self.bank_name
    }

    pub fn currency(&self) -> Option<Currency> {
        self.currency
    }

    pub fn starting_balance(&self) -> Money {
        self.starting_balance
    }

    /// Month currently open for movements. `None` until registered.
    pub fn active_month(&self) -> Option<ActiveMonth> {
        self.active_month
    }

    fn require_active_month(&self) -> Result<ActiveMonth, DomainError> {
        self.active_month
            .ok_or(DomainError::RegistrationRequired {
                aggregate: Self::label(),
                id: self.id,
            })
    }
}

impl Aggregate for Account {
    type Command = AccountCommand;
    type Event = AccountEvent;

    fn aggregate_type() -> &'static str {
        AGGREGATE_TYPE
    }

    fn label() -> &'static str {
        "account"
    }

    fn new(id: Uuid) -> Self {
        Self {
            id,
            name: String::new(),
            bank_name: None,
            currency: None,
            starting_balance: Money::zero(),
            active_month: None,
            version: 0,
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn handle(&self, command: &AccountCommand) -> Result<Vec<AccountEvent>, DomainError> {
        match command {
            AccountCommand::RegisterNewAccount(command) => Ok(vec![
                AccountEvent::NewAccountRegistered(NewAccountRegisteredData {
                    account_id: command.account_id,
                    bank_name: command.bank_name,
                    name: command.name.clone(),
                    account_type: command.account_type,
                    starting_balance: command.starting_balance,
                    starting_balance_date: command.starting_balance_date,
                    currency: command.currency,
                    notes: command.notes.clone(),
                    active_month: ActiveMonth::of(&command.starting_balance_date),
                }),
            ]),

            AccountCommand::StartNextMonth(command) => {
                let current = self.require_active_month()?;

                Ok(vec![AccountEvent::NextMonthStarted(NextMonthStartedData {
                    account_id: command.account_id,
                    balance: command.balance,
                    next_month: current.next(),
                })])
            }
        }
    }

    fn apply(mut self, event: &Event<AccountEvent>) -> Self {
        match &event.data {
            AccountEvent::NewAccountRegistered(data) => {
                self.name = data.name.clone();
                self.bank_name = Some(data.bank_name);
                self.currency = Some(data.currency);
                self.starting_balance = data.starting_balance;
                self.active_month = Some(data.active_month);
            }

            AccountEvent::NextMonthStarted(data) => {
                self.active_month = Some(data.next_month);
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
        .event(NEW_ACCOUNT_REGISTERED, |bytes| {
            Ok(AccountEvent::NewAccountRegistered(serde_json::from_slice(bytes)?).into())
        })
        .event(NEXT_MONTH_STARTED, |bytes| {
            Ok(AccountEvent::NextMonthStarted(serde_json::from_slice(bytes)?).into())
        })
}

pub fn register_commands(builder: TypeRegistryBuilder) -> TypeRegistryBuilder {
    builder
        .command(REGISTER_NEW_ACCOUNT, |bytes| {
            Ok(AccountCommand::RegisterNewAccount(serde_json::from_slice(bytes)?).into())
        })
        .command(START_NEXT_MONTH, |bytes| {
            Ok(AccountCommand::StartNextMonth(serde_json::from_slice(bytes)?).into())
        })
}

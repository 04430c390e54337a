//! Domain module
//!
//! Core domain types and business logic.

pub mod calendar;
pub mod clock;
pub mod context;
pub mod error;
pub mod events;
pub mod ids;
pub mod money;
pub mod types;

pub use calendar::ActiveMonth;
pub use clock::{Clock, ScriptedClock, SystemClock};
pub use context::OperationContext;
pub use error::DomainError;
pub use events::{
    AccountEvent, AccountMonthEvent, DomainEvent, Event, EventPayload, ImportFileEvent,
    MovementTypeEvent, TagCategoryEvent,
};
pub use ids::{
    account_month_id, account_movement_id_for_row, data_row_id, raw_row_hash, RawRowData,
};
pub use money::{Money, MovementAction};
pub use types::{AccountType, BankName, Currency, FileType};

//! walletLedger Library
//!
//! Event-sourced core of a personal ledger: aggregates, the event store
//! adapter over an append-only log, the command dispatcher and the sagas.

pub mod aggregate;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod event_store;
pub mod handlers;
pub mod saga;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use domain::{DomainError, DomainEvent, Event, OperationContext};
pub use event_store::{EventStore, TypeRegistry};
pub use handlers::{Command, CommandDispatcher, CommandHandler};

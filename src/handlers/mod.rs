//! Command Handlers module
//!
//! CQRS command side: the [`Command`] sum type and the dispatcher that
//! runs commands against aggregates and persists the resulting events.

mod commands;
mod dispatcher;

pub use commands::Command;
pub use dispatcher::{CommandDispatcher, CommandHandler};

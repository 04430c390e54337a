//! Command Dispatcher
//!
//! Single entry point for state changes: every command, whether it comes
//! from a caller or from a saga, runs through [`CommandDispatcher`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::aggregate::{
    self, Account, AccountMonth, Aggregate, AggregateCommand, ImportFile, MovementType,
    TagCategory,
};
use crate::domain::{Clock, Event, OperationContext, SystemClock};
use crate::error::AppResult;
use crate::event_store::EventStore;

use super::Command;

/// Anything that accepts commands
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle_command(&self, command: Command, context: &OperationContext) -> AppResult<()>;
}

/// Loads the target aggregate, runs the command and saves the new events
/// with the pre-command version as the concurrency expectation.
#[derive(Clone)]
pub struct CommandDispatcher {
    store: EventStore,
    clock: Arc<dyn Clock>,
}

impl CommandDispatcher {
    pub fn new(store: EventStore) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: EventStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Execute one command against aggregate `A` and return its new state.
    ///
    /// A concurrent writer makes the save fail with a concurrency conflict;
    /// the command is not retried here.
    pub async fn execute<A: Aggregate>(
        &self,
        command: &A::Command,
        context: &OperationContext,
    ) -> AppResult<A> {
        let id = command.aggregate_id();
        let current: A = self.store.load_aggregate(id).await?;
        let base_version = current.version();

        let payloads = aggregate::execute(&current, command)?;

        let events: Vec<Event<A::Event>> = payloads
            .into_iter()
            .enumerate()
            .map(|(i, data)| Event {
                aggregate_type: A::aggregate_type().to_string(),
                aggregate_id: id,
                version: base_version + i as i64 + 1,
                created_at: self.clock.now(),
                metadata: context.clone(),
                data,
            })
            .collect();

        let updated = events
            .iter()
            .fold(current, |aggregate, event| aggregate.apply(event));

        self.store.save::<A>(&events, base_version).await?;

        tracing::info!(
            command = command.command_type(),
            aggregate_type = A::aggregate_type(),
            aggregate_id = %id,
            version = updated.version(),
            events = events.len(),
            issued_by = context.issued_by.as_deref().unwrap_or("-"),
            "Command accepted"
        );

        Ok(updated)
    }
}

#[async_trait]
impl CommandHandler for CommandDispatcher {
    async fn handle_command(&self, command: Command, context: &OperationContext) -> AppResult<()> {
        match command {
            Command::Account(command) => self.execute::<Account>(&command, context).await.map(drop),
            Command::AccountMonth(command) => {
                self.execute::<AccountMonth>(&command, context).await.map(drop)
            }
            Command::ImportFile(command) => {
                self.execute::<ImportFile>(&command, context).await.map(drop)
            }
            Command::MovementType(command) => {
                self.execute::<MovementType>(&command, context).await.map(drop)
            }
            Command::TagCategory(command) => {
                self.execute::<TagCategory>(&command, context).await.map(drop)
            }
        }
    }
}

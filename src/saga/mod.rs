//! Sagas
//!
//! Long-running processes that react to committed events by issuing
//! follow-up commands against other aggregates. Each saga consumes its own
//! durable subscription group, so events may be delivered more than once;
//! every saga is written to be safe under redelivery.

mod account_month_ended;
mod account_registered;
mod import_file_row_verified;
mod subscription;

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{DomainEvent, Event, OperationContext};
use crate::error::AppResult;
use crate::event_store::EventStore;
use crate::handlers::{Command, CommandHandler};

pub use account_month_ended::AccountMonthEndedSaga;
pub use account_registered::AccountRegisteredSaga;
pub use import_file_row_verified::ImportFileDataRowVerifiedSaga;
pub use subscription::{PollOutcome, SagaSubscription, SubscriptionSettings};

/// Reaction to a fixed set of event types
#[async_trait]
pub trait Saga: Send + Sync {
    /// Stable name; also names the subscription group
    fn saga_type(&self) -> &'static str;

    /// Event types this saga is subscribed to
    fn matcher(&self) -> &'static [&'static str];

    async fn run(&self, event: &Event<DomainEvent>, handler: &dyn CommandHandler) -> AppResult<()>;
}

/// Every saga of the system
pub fn all_sagas(store: &EventStore) -> Vec<Arc<dyn Saga>> {
    vec![
        Arc::new(AccountRegisteredSaga),
        Arc::new(AccountMonthEndedSaga::new(store.clone())),
        Arc::new(ImportFileDataRowVerifiedSaga::new(store.clone())),
    ]
}

/// Context for commands issued while handling `event`
pub fn saga_context(saga_type: &str, event: &Event<DomainEvent>) -> OperationContext {
    let context = OperationContext::new()
        .with_causation_id(event.coordinate())
        .with_issuer(saga_type);

    match event.metadata.correlation_id {
        Some(correlation_id) => context.with_correlation_id(correlation_id),
        None => context,
    }
}

/// Issue a command, treating "already applied" rejections as success
pub(crate) async fn issue(
    handler: &dyn CommandHandler,
    command: impl Into<Command>,
    context: &OperationContext,
) -> AppResult<()> {
    let command = command.into();
    let command_type = command.command_type();
    let aggregate_id = command.aggregate_id();

    match handler.handle_command(command, context).await {
        Ok(()) => Ok(()),
        Err(err) if err.is_duplicate() => {
            tracing::debug!(
                command = command_type,
                aggregate_id = %aggregate_id,
                error = %err,
                "Command already applied, skipping"
            );
            Ok(())
        }
        Err(err) => Err(err),
    }
}

//! Rolls an account over to its next month when a ledger month is closed.

use async_trait::async_trait;

use crate::aggregate::account::{AccountCommand, StartNextMonth};
use crate::aggregate::account_month::{AccountMonthCommand, StartAccountMonth};
use crate::aggregate::{Account, Aggregate};
use crate::domain::events::ACCOUNT_MONTH_ENDED;
use crate::domain::{account_month_id, AccountMonthEvent, DomainError, DomainEvent, Event};
use crate::error::AppResult;
use crate::event_store::EventStore;
use crate::handlers::CommandHandler;

use super::{issue, saga_context, Saga};

pub const SAGA_TYPE: &str = "AccountMonthEndedSaga";

/// `account_month_ended` -> `StartNextMonth` on the account, then
/// `StartAccountMonth` for the month the account moved to, carrying the
/// end balance over as the new start balance.
#[derive(Debug, Clone)]
pub struct AccountMonthEndedSaga {
    store: EventStore,
}

impl AccountMonthEndedSaga {
    pub fn new(store: EventStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Saga for AccountMonthEndedSaga {
    fn saga_type(&self) -> &'static str {
        SAGA_TYPE
    }

    fn matcher(&self) -> &'static [&'static str] {
        &[ACCOUNT_MONTH_ENDED]
    }

    async fn run(&self, event: &Event<DomainEvent>, handler: &dyn CommandHandler) -> AppResult<()> {
        let DomainEvent::AccountMonth(AccountMonthEvent::MonthEnded(data)) = &event.data else {
            return Ok(());
        };
        let context = saga_context(SAGA_TYPE, event);

        let account: Account = self.store.load_aggregate(data.account_id).await?;
        let active = account.active_month().ok_or(DomainError::RegistrationRequired {
            aggregate: Account::label(),
            id: data.account_id,
        })?;

        // A redelivered event finds the account already moved on
        let next_month = if active == data.month {
            let command = AccountCommand::StartNextMonth(StartNextMonth {
                account_id: data.account_id,
                balance: data.end_balance,
            });
            issue(handler, command, &context).await?;

            let account: Account = self.store.load_aggregate(data.account_id).await?;
            account.active_month().unwrap_or_else(|| data.month.next())
        } else {
            tracing::debug!(
                saga = SAGA_TYPE,
                account_id = %data.account_id,
                ended = %data.month,
                active = %active,
                "Account already advanced"
            );
            data.month.next()
        };

        tracing::info!(
            saga = SAGA_TYPE,
            account_id = %data.account_id,
            month = %next_month,
            start_balance = %data.end_balance,
            "Starting next account month"
        );

        let command = AccountMonthCommand::StartAccountMonth(StartAccountMonth {
            account_month_id: account_month_id(data.account_id, next_month),
            account_id: data.account_id,
            start_balance: data.end_balance,
            month: next_month,
        });
        issue(handler, command, &context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::account_month::EndAccountMonth;
    use crate::aggregate::AccountMonth;
    use crate::domain::{ActiveMonth, Money, OperationContext};
    use crate::handlers::Command;
    use crate::saga::testing::*;
    use crate::saga::AccountRegisteredSaga;
    use uuid::Uuid;

    /// Registered account with its February month started and then ended
    async fn ended_february(harness: &Harness, account_id: Uuid) -> Event<DomainEvent> {
        let context = OperationContext::new();
        harness
            .handler
            .handle_command(register_account(account_id, Money::from_cents(4_000)), &context)
            .await
            .unwrap();
        let registered = last_event(harness).await;
        AccountRegisteredSaga
            .run(&registered, harness.handler.as_ref())
            .await
            .unwrap();

        let february = ActiveMonth::new(2, 2023).unwrap();
        harness
            .handler
            .handle_command(
                AccountMonthCommand::EndAccountMonth(EndAccountMonth {
                    account_month_id: account_month_id(account_id, february),
                    account_id,
                    end_balance: Money::from_cents(4_000),
                    month: february,
                })
                .into(),
                &context,
            )
            .await
            .unwrap();
        harness.handler.take().await;

        last_event(harness).await
    }

    #[tokio::test]
    async fn test_issues_exactly_next_month_then_month_start() {
        let harness = harness();
        let account_id = Uuid::new_v4();
        let ended = ended_february(&harness, account_id).await;
        let saga = AccountMonthEndedSaga::new(harness.store.clone());

        saga.run(&ended, harness.handler.as_ref()).await.unwrap();

        let march = ActiveMonth::new(3, 2023).unwrap();
        assert_eq!(
            harness.handler.take().await,
            vec![
                Command::Account(AccountCommand::StartNextMonth(StartNextMonth {
                    account_id,
                    balance: Money::from_cents(4_000),
                })),
                Command::AccountMonth(AccountMonthCommand::StartAccountMonth(StartAccountMonth {
                    account_month_id: account_month_id(account_id, march),
                    account_id,
                    start_balance: Money::from_cents(4_000),
                    month: march,
                })),
            ]
        );

        let account: Account = harness.store.load_aggregate(account_id).await.unwrap();
        assert_eq!(account.active_month(), Some(march));
        let month: AccountMonth = harness
            .store
            .load_aggregate(account_month_id(account_id, march))
            .await
            .unwrap();
        assert_eq!(month.start_balance(), Money::from_cents(4_000));
    }

    #[tokio::test]
    async fn test_redelivery_changes_nothing() {
        let harness = harness();
        let account_id = Uuid::new_v4();
        let ended = ended_february(&harness, account_id).await;
        let saga = AccountMonthEndedSaga::new(harness.store.clone());

        saga.run(&ended, harness.handler.as_ref()).await.unwrap();
        let events_after_first = harness.log.len().await;
        harness.handler.take().await;

        saga.run(&ended, harness.handler.as_ref()).await.unwrap();

        assert_eq!(harness.log.len().await, events_after_first);
        let account: Account = harness.store.load_aggregate(account_id).await.unwrap();
        assert_eq!(account.active_month(), ActiveMonth::new(3, 2023));

        // only the idempotent month start is re-issued
        let reissued = harness.handler.take().await;
        assert_eq!(reissued.len(), 1);
        assert_eq!(reissued[0].command_type(), "start_account_month");
    }
}

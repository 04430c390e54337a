//! Opens the first ledger month of a newly registered account.

use async_trait::async_trait;

use crate::aggregate::account_month::{AccountMonthCommand, StartAccountMonth};
use crate::domain::events::NEW_ACCOUNT_REGISTERED;
use crate::domain::{account_month_id, AccountEvent, DomainEvent, Event};
use crate::error::AppResult;
use crate::handlers::CommandHandler;

use super::{issue, saga_context, Saga};

pub const SAGA_TYPE: &str = "AccountRegisterSaga";

/// `new_account_registered` -> `StartAccountMonth` for the account's active month
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountRegisteredSaga;

#[async_trait]
impl Saga for AccountRegisteredSaga {
    fn saga_type(&self) -> &'static str {
        SAGA_TYPE
    }

    fn matcher(&self) -> &'static [&'static str] {
        &[NEW_ACCOUNT_REGISTERED]
    }

    async fn run(&self, event: &Event<DomainEvent>, handler: &dyn CommandHandler) -> AppResult<()> {
        let DomainEvent::Account(AccountEvent::NewAccountRegistered(data)) = &event.data else {
            return Ok(());
        };

        let command = AccountMonthCommand::StartAccountMonth(StartAccountMonth {
            account_month_id: account_month_id(data.account_id, data.active_month),
            account_id: data.account_id,
            start_balance: data.starting_balance,
            month: data.active_month,
        });

        tracing::info!(
            saga = SAGA_TYPE,
            account_id = %data.account_id,
            month = %data.active_month,
            "Starting first account month"
        );

        issue(handler, command, &saga_context(SAGA_TYPE, event)).await
    }
}

//! Books a verified statement row into the account's open ledger month.

use async_trait::async_trait;

use crate::aggregate::account_month::{AccountMonthCommand, RegisterNewAccountMovement};
use crate::aggregate::import_file::{
    ImportFileCommand, RegisterAccountMovementIdForVerifiedFileDataRow,
};
use crate::aggregate::{Account, Aggregate, ImportFile};
use crate::domain::events::FILE_DATA_ROW_MARKED_AS_VERIFIED;
use crate::domain::{
    account_month_id, account_movement_id_for_row, DomainError, DomainEvent, Event,
    ImportFileEvent, MovementAction,
};
use crate::error::{AppError, AppResult};
use crate::event_store::EventStore;
use crate::handlers::CommandHandler;

use super::{issue, saga_context, Saga};

pub const SAGA_TYPE: &str = "ImportFileDataRowVerifiedSaga";

/// `file_data_row_marked_as_verified` -> `RegisterNewAccountMovement` in the
/// account's active month, then `RegisterAccountMovementIdForVerifiedFileDataRow`
/// on the file.
///
/// The movement id is derived from the file and row ids, so a redelivered
/// event targets the same movement.
#[derive(Debug, Clone)]
pub struct ImportFileDataRowVerifiedSaga {
    store: EventStore,
}

impl ImportFileDataRowVerifiedSaga {
    pub fn new(store: EventStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Saga for ImportFileDataRowVerifiedSaga {
    fn saga_type(&self) -> &'static str {
        SAGA_TYPE
    }

    fn matcher(&self) -> &'static [&'static str] {
        &[FILE_DATA_ROW_MARKED_AS_VERIFIED]
    }

    async fn run(&self, event: &Event<DomainEvent>, handler: &dyn CommandHandler) -> AppResult<()> {
        let DomainEvent::ImportFile(ImportFileEvent::FileDataRowMarkedAsVerified(data)) = &event.data
        else {
            return Ok(());
        };
        let context = saga_context(SAGA_TYPE, event);

        let file: ImportFile = self.store.load_aggregate(data.import_file_id).await?;
        let row = file.row(data.file_data_row_id).ok_or_else(|| {
            AppError::Internal(format!(
                "importfile {} has no data row {}",
                data.import_file_id, data.file_data_row_id
            ))
        })?;

        if let Some(movement_id) = row.account_movement_id {
            tracing::debug!(
                saga = SAGA_TYPE,
                import_file_id = %data.import_file_id,
                file_data_row_id = %data.file_data_row_id,
                account_movement_id = %movement_id,
                "Row already booked"
            );
            return Ok(());
        }

        let account: Account = self.store.load_aggregate(file.account_id()).await?;
        let active = account.active_month().ok_or(DomainError::RegistrationRequired {
            aggregate: Account::label(),
            id: file.account_id(),
        })?;

        let account_movement_id = account_movement_id_for_row(data.import_file_id, data.file_data_row_id);
        let (action, amount) = if row.amount.is_negative() {
            (MovementAction::Debit, row.amount.abs())
        } else {
            (MovementAction::Credit, row.amount)
        };

        tracing::info!(
            saga = SAGA_TYPE,
            import_file_id = %data.import_file_id,
            file_data_row_id = %data.file_data_row_id,
            account_movement_id = %account_movement_id,
            month = %active,
            %action,
            %amount,
            "Booking verified row"
        );

        let movement = AccountMonthCommand::RegisterNewAccountMovement(RegisterNewAccountMovement {
            account_month_id: account_month_id(file.account_id(), active),
            account_movement_id,
            movement_type_id: data.movement_type_id,
            action,
            amount,
            date: row.date,
            source_account_id: data.source_account_id,
            description: data.description.clone(),
            notes: None,
            tag_ids: data.tag_ids.clone(),
        });
        issue(handler, movement, &context).await?;

        let link = ImportFileCommand::RegisterAccountMovementIdForVerifiedFileDataRow(
            RegisterAccountMovementIdForVerifiedFileDataRow {
                import_file_id: data.import_file_id,
                file_data_row_id: data.file_data_row_id,
                account_movement_id,
            },
        );
        issue(handler, link, &context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::import_file::{
        AddFileDataRow, FileParseTransition, RegisterNewImportFile, VerifyFileDataRow,
    };
    use crate::aggregate::AccountMonth;
    use crate::domain::{ActiveMonth, FileType, Money, OperationContext};
    use crate::handlers::Command;
    use crate::saga::testing::*;
    use crate::saga::AccountRegisteredSaga;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    struct Fixture {
        account_id: Uuid,
        import_file_id: Uuid,
        row_id: Uuid,
        verified: Event<DomainEvent>,
    }

    async fn verified_row(harness: &Harness, amount: Money) -> Fixture {
        let context = OperationContext::new();
        let account_id = Uuid::new_v4();
        let import_file_id = Uuid::new_v4();
        let row_id = Uuid::new_v4();
        let movement_type_id = Uuid::new_v4();
        let send = |command: Command| {
            let handler = harness.handler.clone();
            let context = context.clone();
            async move { handler.handle_command(command, &context).await.unwrap() }
        };

        send(register_account(account_id, Money::from_cents(10_000))).await;
        let registered = last_event(harness).await;
        AccountRegisteredSaga
            .run(&registered, harness.handler.as_ref())
            .await
            .unwrap();

        send(
            ImportFileCommand::RegisterNewImportFile(RegisterNewImportFile {
                import_file_id,
                account_id,
                filename: "statement-2023-02.csv".to_string(),
                file_type: FileType::Csv,
            })
            .into(),
        )
        .await;
        let parse = FileParseTransition { import_file_id };
        send(ImportFileCommand::StartFileParse(parse.clone()).into()).await;
        send(ImportFileCommand::EndFileParse(parse).into()).await;
        send(
            ImportFileCommand::AddFileDataRow(AddFileDataRow {
                import_file_id,
                file_data_row_id: row_id,
                date: Utc.with_ymd_and_hms(2023, 2, 17, 0, 0, 0).unwrap(),
                description: "REWE SAGT DANKE".to_string(),
                amount,
                raw_data: Default::default(),
            })
            .into(),
        )
        .await;
        send(
            ImportFileCommand::VerifyFileDataRow(VerifyFileDataRow {
                import_file_id,
                file_data_row_id: row_id,
                movement_type_id: Some(movement_type_id),
                source_account_id: None,
                description: "Groceries".to_string(),
                tag_ids: vec![],
            })
            .into(),
        )
        .await;

        let verified = last_event(harness).await;
        harness.handler.take().await;

        Fixture {
            account_id,
            import_file_id,
            row_id,
            verified,
        }
    }

    #[tokio::test]
    async fn test_negative_row_is_booked_as_debit_and_linked() {
        let harness = harness();
        let fixture = verified_row(&harness, Money::from_cents(-2_345)).await;
        let saga = ImportFileDataRowVerifiedSaga::new(harness.store.clone());

        saga.run(&fixture.verified, harness.handler.as_ref())
            .await
            .unwrap();

        let commands = harness.handler.take().await;
        assert_eq!(commands.len(), 2);
        let movement_id = account_movement_id_for_row(fixture.import_file_id, fixture.row_id);
        match &commands[0] {
            Command::AccountMonth(AccountMonthCommand::RegisterNewAccountMovement(command)) => {
                assert_eq!(command.account_movement_id, movement_id);
                assert_eq!(command.action, MovementAction::Debit);
                assert_eq!(command.amount, Money::from_cents(2_345));
                assert_eq!(command.description, "Groceries");
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(
            commands[1].command_type(),
            "register_account_movement_verified_file_data_row_command"
        );

        let february = ActiveMonth::new(2, 2023).unwrap();
        let month: AccountMonth = harness
            .store
            .load_aggregate(account_month_id(fixture.account_id, february))
            .await
            .unwrap();
        assert_eq!(month.balance(), Money::from_cents(10_000 - 2_345));
        assert!(month.has_movement(movement_id));

        let file: ImportFile = harness.store.load_aggregate(fixture.import_file_id).await.unwrap();
        assert_eq!(
            file.row(fixture.row_id).unwrap().account_movement_id,
            Some(movement_id)
        );
    }

    #[tokio::test]
    async fn test_positive_row_is_credit() {
        let harness = harness();
        let fixture = verified_row(&harness, Money::from_cents(500)).await;
        let saga = ImportFileDataRowVerifiedSaga::new(harness.store.clone());

        saga.run(&fixture.verified, harness.handler.as_ref())
            .await
            .unwrap();

        let february = ActiveMonth::new(2, 2023).unwrap();
        let month: AccountMonth = harness
            .store
            .load_aggregate(account_month_id(fixture.account_id, february))
            .await
            .unwrap();
        assert_eq!(month.balance(), Money::from_cents(10_500));
    }

    #[tokio::test]
    async fn test_redelivery_books_once() {
        let harness = harness();
        let fixture = verified_row(&harness, Money::from_cents(-100)).await;
        let saga = ImportFileDataRowVerifiedSaga::new(harness.store.clone());

        saga.run(&fixture.verified, harness.handler.as_ref())
            .await
            .unwrap();
        let events_after_first = harness.log.len().await;
        harness.handler.take().await;

        saga.run(&fixture.verified, harness.handler.as_ref())
            .await
            .unwrap();

        assert_eq!(harness.log.len().await, events_after_first);
        assert!(harness.handler.take().await.is_empty());
    }
}

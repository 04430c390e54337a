//! Integration tests for the event store adapter
//!
//! The in-memory tests always run. The PostgreSQL ones are ignored by
//! default; run them with `DATABASE_URL` set and `--ignored`.

use std::sync::Arc;

use chrono::Utc;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use wallet_ledger::aggregate::account::{AccountCommand, StartNextMonth};
use wallet_ledger::aggregate::{type_registry, Account, Aggregate};
use wallet_ledger::domain::{AccountEvent, ActiveMonth, Event, Money, OperationContext};
use wallet_ledger::event_store::{
    stream_name, EventData, EventLog, EventStore, EventStoreError, ExpectedRevision, NackAction,
    PersistentSubscriptions, PgEventLog,
};
use wallet_ledger::{AppError, CommandDispatcher, CommandHandler};

mod common;

use common::{register_account, Ledger};

#[tokio::test]
async fn test_history_survives_pagination_and_system_events() {
    let ledger = Ledger::new();
    let store = ledger.store.clone().with_batch_size(3);
    let account_id = Uuid::new_v4();

    assert_ok!(ledger.send(register_account(account_id, Money::from_cents(100))).await);
    for _ in 0..4 {
        assert_ok!(
            ledger
                .send(AccountCommand::StartNextMonth(StartNextMonth {
                    account_id,
                    balance: Money::from_cents(100),
                }))
                .await
        );
    }
    // log infrastructure events trail the domain events
    for _ in 0..4 {
        ledger
            .log
            .append_to_stream(
                &stream_name("account", account_id),
                ExpectedRevision::Any,
                vec![EventData::json("$checkpoint", b"{}".to_vec(), vec![], Utc::now())],
            )
            .await
            .unwrap();
    }

    let history = store.load::<Account>(account_id).await.unwrap();
    let versions: Vec<i64> = history.iter().map(|event| event.version).collect();
    assert_eq!(versions, vec![1, 2, 3, 4, 5]);

    let account: Account = store.load_aggregate(account_id).await.unwrap();
    assert_eq!(account.version(), 5);
    assert_eq!(account.active_month(), ActiveMonth::new(6, 2023));
}

#[tokio::test]
async fn test_stale_writer_gets_concurrency_conflict() {
    let ledger = Ledger::new();
    let account_id = Uuid::new_v4();
    assert_ok!(ledger.send(register_account(account_id, Money::zero())).await);

    // Two writers load the same version and both try to advance the month
    let history = ledger.store.load::<Account>(account_id).await.unwrap();
    let stale: Vec<Event<AccountEvent>> = history
        .iter()
        .map(|event| Event {
            version: 2,
            ..event.clone()
        })
        .collect();

    assert_ok!(
        ledger
            .send(AccountCommand::StartNextMonth(StartNextMonth {
                account_id,
                balance: Money::zero(),
            }))
            .await
    );
    let conflict = assert_err!(ledger.store.save::<Account>(&stale, 1).await);

    assert!(conflict.is_concurrency_conflict());
    assert_eq!(ledger.log.len().await, 2);
}

#[tokio::test]
async fn test_reading_past_missing_stream_is_an_error() {
    let ledger = Ledger::new();
    let missing = Uuid::new_v4();

    assert!(ledger.store.load::<Account>(missing).await.unwrap().is_empty());
    assert!(matches!(
        ledger.store.load_from::<Account>(missing, 2).await,
        Err(EventStoreError::StreamNotFound { .. })
    ));
}

// =========================================================================
// PostgreSQL
// =========================================================================

fn pg_store(pool: sqlx::PgPool) -> (Arc<PgEventLog>, EventStore) {
    let log = Arc::new(PgEventLog::new(pool));
    let store = EventStore::new(log.clone(), Arc::new(type_registry())).with_batch_size(2);
    (log, store)
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pg_append_and_load() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let (_, store) = pg_store(pool);
    let dispatcher = CommandDispatcher::new(store.clone());
    let account_id = Uuid::new_v4();
    let context = OperationContext::new().with_correlation_id(Uuid::new_v4());

    assert_ok!(
        dispatcher
            .handle_command(register_account(account_id, Money::from_cents(990)).into(), &context)
            .await
    );
    for _ in 0..3 {
        assert_ok!(
            dispatcher
                .handle_command(
                    AccountCommand::StartNextMonth(StartNextMonth {
                        account_id,
                        balance: Money::from_cents(990),
                    })
                    .into(),
                    &context,
                )
                .await
        );
    }

    let history = store.load::<Account>(account_id).await.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[3].version, 4);
    assert_eq!(history[0].metadata.correlation_id, context.correlation_id);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pg_duplicate_registration_and_conflict() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let (log, store) = pg_store(pool);
    let dispatcher = CommandDispatcher::new(store.clone());
    let account_id = Uuid::new_v4();
    let context = OperationContext::new();

    assert_ok!(
        dispatcher
            .handle_command(register_account(account_id, Money::zero()).into(), &context)
            .await
    );
    let err = assert_err!(
        dispatcher
            .handle_command(register_account(account_id, Money::zero()).into(), &context)
            .await
    );
    assert!(matches!(err, AppError::Domain(_)));

    let stale = log
        .append_to_stream(
            &stream_name("account", account_id),
            ExpectedRevision::NoStream,
            vec![EventData::json("$noise", b"{}".to_vec(), vec![], Utc::now())],
        )
        .await;
    assert!(stale.is_err());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pg_subscription_group_lifecycle() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let (log, _) = pg_store(pool);
    let stream = stream_name("account", Uuid::new_v4());
    let events = vec![
        EventData::json("wanted", b"{}".to_vec(), vec![], Utc::now()),
        EventData::json("other", b"{}".to_vec(), vec![], Utc::now()),
        EventData::json("wanted", b"{}".to_vec(), vec![], Utc::now()),
    ];
    assert_ok!(log.append_to_stream(&stream, ExpectedRevision::NoStream, events).await);
    assert_ok!(log.create_group("saga-test", &["wanted"]).await);

    let batch = log.receive("saga-test", 10).await.unwrap();
    assert_eq!(batch.len(), 2);

    assert_ok!(log.nack("saga-test", batch[0].position, NackAction::Park, "bad payload").await);
    assert_eq!(log.parked("saga-test").await.unwrap(), vec![batch[0].position]);

    assert_ok!(log.ack("saga-test", batch[1].position).await);
    assert!(log.receive("saga-test", 10).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pg_concurrent_streams_are_read_without_gaps() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let (log, _) = pg_store(pool);
    assert_ok!(log.create_group("saga-gapless", &["wanted"]).await);

    let writers: Vec<_> = (0..8)
        .map(|_| {
            let log = log.clone();
            tokio::spawn(async move {
                log.append_to_stream(
                    &stream_name("account", Uuid::new_v4()),
                    ExpectedRevision::NoStream,
                    vec![EventData::json("wanted", b"{}".to_vec(), vec![], Utc::now())],
                )
                .await
            })
        })
        .collect();
    for writer in writers {
        assert_ok!(writer.await.unwrap());
    }

    let batch = log.receive("saga-gapless", 100).await.unwrap();
    let positions: Vec<u64> = batch.iter().map(|event| event.position).collect();
    assert_eq!(positions, (1..=8).collect::<Vec<u64>>());
}

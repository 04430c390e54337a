//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use wallet_ledger::aggregate::account::{AccountCommand, RegisterNewAccount};
use wallet_ledger::aggregate::type_registry;
use wallet_ledger::domain::{AccountType, BankName, Currency, Money, ScriptedClock};
use wallet_ledger::event_store::{EventStore, InMemoryEventLog};
use wallet_ledger::{AppResult, Command, CommandDispatcher, CommandHandler, OperationContext};

/// Dispatcher wrapper that records every command it receives
pub struct RecordingHandler {
    dispatcher: CommandDispatcher,
    commands: Mutex<Vec<Command>>,
}

impl RecordingHandler {
    pub async fn take(&self) -> Vec<Command> {
        std::mem::take(&mut *self.commands.lock().await)
    }
}

#[async_trait]
impl CommandHandler for RecordingHandler {
    async fn handle_command(&self, command: Command, context: &OperationContext) -> AppResult<()> {
        self.commands.lock().await.push(command.clone());
        self.dispatcher.handle_command(command, context).await
    }
}

/// Whole command side wired on the in-memory log
pub struct Ledger {
    pub log: InMemoryEventLog,
    pub store: EventStore,
    pub handler: Arc<RecordingHandler>,
}

impl Ledger {
    pub fn new() -> Self {
        let log = InMemoryEventLog::new();
        let store = EventStore::new(Arc::new(log.clone()), Arc::new(type_registry()));
        let clock = ScriptedClock::frozen(Utc.with_ymd_and_hms(2023, 2, 28, 18, 0, 0).unwrap());

        Self {
            handler: Arc::new(RecordingHandler {
                dispatcher: CommandDispatcher::with_clock(store.clone(), Arc::new(clock)),
                commands: Mutex::new(Vec::new()),
            }),
            log,
            store,
        }
    }

    pub async fn send(&self, command: impl Into<Command>) -> AppResult<()> {
        self.handler
            .handle_command(command.into(), &OperationContext::new().with_issuer("test"))
            .await
    }
}

pub fn february_2023() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 2, 10, 0, 0, 0).unwrap()
}

pub fn register_account(account_id: Uuid, starting_balance: Money) -> AccountCommand {
    AccountCommand::RegisterNewAccount(RegisterNewAccount {
        account_id,
        bank_name: BankName::DeutscheBank,
        name: "Giro".to_string(),
        account_type: AccountType::Checking,
        starting_balance,
        starting_balance_date: february_2023(),
        currency: Currency::Eur,
        notes: Some("main account".to_string()),
    })
}

/// Pool on a fresh event log schema, or `None` when DATABASE_URL is unset
pub async fn setup_test_db() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    wallet_ledger::db::ensure_schema(&pool)
        .await
        .expect("Failed to create schema");

    // Clean up DB for fresh state
    sqlx::query("TRUNCATE TABLE stream_events, subscription_groups, parked_events RESTART IDENTITY")
        .execute(&pool)
        .await
        .expect("Failed to clean up DB");

    Some(pool)
}

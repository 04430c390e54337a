//! Saga Subscription
//!
//! Drives one saga from its durable consumer group. Events are acked once
//! the saga succeeds. A retryable failure is redelivered (stopping the batch
//! so later events of the group are not handled ahead of it) until it has
//! failed `max_deliveries` times, then parked. Any other failure is parked
//! on the spot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::AppResult;
use crate::event_store::{EventStore, NackAction, PersistentSubscriptions, RecordedEvent};
use crate::handlers::CommandHandler;

use super::Saga;

/// Polling knobs of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionSettings {
    /// Events fetched per poll
    pub batch_size: usize,
    /// Deliveries of a failing event before it is parked
    pub max_deliveries: u32,
    pub poll_interval: Duration,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            batch_size: 32,
            max_deliveries: 5,
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl SubscriptionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_deliveries: config.saga_max_deliveries,
            poll_interval: config.saga_poll_interval,
            ..Self::default()
        }
    }
}

/// What a single poll did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub processed: usize,
    pub retried: usize,
    pub parked: usize,
}

impl PollOutcome {
    pub fn is_idle(&self) -> bool {
        self.processed == 0 && self.retried == 0 && self.parked == 0
    }
}

pub struct SagaSubscription {
    saga: Arc<dyn Saga>,
    subscriptions: Arc<dyn PersistentSubscriptions>,
    store: EventStore,
    handler: Arc<dyn CommandHandler>,
    settings: SubscriptionSettings,
    /// Failed deliveries per global position
    attempts: Mutex<HashMap<u64, u32>>,
}

impl SagaSubscription {
    pub fn new(
        saga: Arc<dyn Saga>,
        subscriptions: Arc<dyn PersistentSubscriptions>,
        store: EventStore,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        Self {
            saga,
            subscriptions,
            store,
            handler,
            settings: SubscriptionSettings::default(),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_settings(mut self, settings: SubscriptionSettings) -> Self {
        self.settings = SubscriptionSettings {
            batch_size: settings.batch_size.max(1),
            max_deliveries: settings.max_deliveries.max(1),
            poll_interval: settings.poll_interval.max(Duration::from_millis(1)),
        };
        self
    }

    /// `saga-{saga type}`
    pub fn group_name(&self) -> String {
        format!("saga-{}", self.saga.saga_type())
    }

    /// Create the consumer group if it does not exist yet
    pub async fn start(&self) -> AppResult<()> {
        let group = self.group_name();
        self.subscriptions
            .create_group(&group, self.saga.matcher())
            .await?;

        tracing::info!(group = %group, events = ?self.saga.matcher(), "Saga subscription ready");
        Ok(())
    }

    /// Fetch one batch and run the saga over it
    pub async fn poll_once(&self) -> AppResult<PollOutcome> {
        let group = self.group_name();
        let batch = self
            .subscriptions
            .receive(&group, self.settings.batch_size)
            .await?;

        let mut outcome = PollOutcome::default();

        for recorded in batch {
            let event = match self.store.decode_recorded(&recorded) {
                Ok(event) => event,
                Err(err) => {
                    // Undecodable payloads never succeed on redelivery
                    self.park(&group, &recorded, &err.to_string()).await?;
                    outcome.parked += 1;
                    continue;
                }
            };

            match self.saga.run(&event, self.handler.as_ref()).await {
                Ok(()) => {
                    self.subscriptions.ack(&group, recorded.position).await?;
                    self.attempts.lock().await.remove(&recorded.position);
                    outcome.processed += 1;
                }
                Err(err) if !err.is_retryable() => {
                    self.park(&group, &recorded, &err.to_string()).await?;
                    self.attempts.lock().await.remove(&recorded.position);
                    outcome.parked += 1;
                }
                Err(err) => {
                    let attempts = {
                        let mut attempts = self.attempts.lock().await;
                        let count = attempts.entry(recorded.position).or_insert(0);
                        *count += 1;
                        *count
                    };

                    if attempts >= self.settings.max_deliveries {
                        self.park(&group, &recorded, &err.to_string()).await?;
                        self.attempts.lock().await.remove(&recorded.position);
                        outcome.parked += 1;
                        continue;
                    }

                    tracing::warn!(
                        group = %group,
                        position = recorded.position,
                        event_type = %recorded.event_type,
                        attempts,
                        error = %err,
                        "Saga failed, event will be redelivered"
                    );
                    self.subscriptions
                        .nack(&group, recorded.position, NackAction::Retry, &err.to_string())
                        .await?;
                    outcome.retried += 1;
                    break;
                }
            }
        }

        Ok(outcome)
    }

    async fn park(&self, group: &str, recorded: &RecordedEvent, reason: &str) -> AppResult<()> {
        tracing::error!(
            group = %group,
            stream = %recorded.stream_id,
            revision = recorded.revision,
            position = recorded.position,
            event_type = %recorded.event_type,
            reason,
            "Parking event"
        );

        self.subscriptions
            .nack(group, recorded.position, NackAction::Park, reason)
            .await?;
        Ok(())
    }

    /// Poll until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) -> AppResult<()> {
        self.start().await?;

        let group = self.group_name();
        let mut ticker = interval(self.settings.poll_interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(group = %group, "Saga subscription stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    // Drain the backlog before waiting for the next tick
                    loop {
                        match self.poll_once().await {
                            Ok(outcome) if outcome.processed > 0 && outcome.retried == 0 => {
                                tracing::debug!(group = %group, ?outcome, "Saga batch processed");
                            }
                            Ok(_) => break,
                            Err(err) => {
                                tracing::error!(group = %group, error = %err, "Saga poll failed");
                                break;
                            }
                        }
                        if shutdown.is_cancelled() {
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Spawn the subscription loop on the runtime
    pub fn spawn(
        self: Arc<Self>,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<AppResult<()>> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DomainError, DomainEvent, Event, Money, OperationContext};
    use crate::error::AppError;
    use crate::event_store::{
        stream_name, EventData, EventLog, EventStoreError, ExpectedRevision, InMemoryEventLog,
    };
    use crate::saga::testing::*;
    use crate::saga::AccountRegisteredSaga;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    /// Saga that fails its first `failures` runs
    struct Flaky {
        failures: usize,
        runs: AtomicUsize,
        error: fn() -> AppError,
    }

    impl Flaky {
        fn new(failures: usize, error: fn() -> AppError) -> Self {
            Self {
                failures,
                runs: AtomicUsize::new(0),
                error,
            }
        }
    }

    fn stale_read() -> AppError {
        EventStoreError::ConcurrencyConflict {
            stream: "account-x".to_string(),
            expected_version: 1,
        }
        .into()
    }

    fn rejected() -> AppError {
        DomainError::MismatchedEndBalance {
            id: Uuid::nil(),
            balance: "1.00".to_string(),
            end_balance: "2.00".to_string(),
        }
        .into()
    }

    fn month_not_started() -> AppError {
        DomainError::RegistrationRequired {
            aggregate: "account month",
            id: Uuid::nil(),
        }
        .into()
    }

    #[async_trait]
    impl Saga for Flaky {
        fn saga_type(&self) -> &'static str {
            "FlakySaga"
        }

        fn matcher(&self) -> &'static [&'static str] {
            &["new_account_registered"]
        }

        async fn run(&self, _event: &Event<DomainEvent>, _handler: &dyn CommandHandler) -> AppResult<()> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            if run < self.failures {
                Err((self.error)())
            } else {
                Ok(())
            }
        }
    }

    fn subscription(harness: &Harness, saga: Arc<dyn Saga>, max_deliveries: u32) -> SagaSubscription {
        SagaSubscription::new(
            saga,
            Arc::new(harness.log.clone()),
            harness.store.clone(),
            harness.handler.clone(),
        )
        .with_settings(SubscriptionSettings {
            batch_size: 10,
            max_deliveries,
            poll_interval: Duration::from_millis(10),
        })
    }

    async fn register(harness: &Harness) -> Uuid {
        let account_id = Uuid::new_v4();
        harness
            .handler
            .handle_command(register_account(account_id, Money::zero()), &OperationContext::new())
            .await
            .unwrap();
        account_id
    }

    #[tokio::test]
    async fn test_processes_matching_events_and_acks() {
        let harness = harness();
        register(&harness).await;
        register(&harness).await;
        let subscription = subscription(&harness, Arc::new(AccountRegisteredSaga), 3);
        subscription.start().await.unwrap();

        let outcome = subscription.poll_once().await.unwrap();
        assert_eq!(outcome.processed, 2);

        // the month starts the saga issued are not in its matcher
        assert!(subscription.poll_once().await.unwrap().is_idle());
        assert_eq!(harness.log.len().await, 4);
        assert_eq!(subscription.group_name(), "saga-AccountRegisterSaga");
    }

    #[tokio::test]
    async fn test_failure_is_redelivered_then_succeeds() {
        let harness = harness();
        register(&harness).await;
        register(&harness).await;
        let saga = Arc::new(Flaky::new(1, stale_read));
        let subscription = subscription(&harness, saga.clone(), 3);
        subscription.start().await.unwrap();

        let first = subscription.poll_once().await.unwrap();
        assert_eq!(first, PollOutcome { processed: 0, retried: 1, parked: 0 });

        let second = subscription.poll_once().await.unwrap();
        assert_eq!(second.processed, 2);
        assert_eq!(saga.runs.load(Ordering::SeqCst), 3);
        assert!(harness.log.parked("saga-FlakySaga").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_event_is_parked_after_max_deliveries() {
        let harness = harness();
        register(&harness).await;
        let saga = Arc::new(Flaky::new(usize::MAX, stale_read));
        let subscription = subscription(&harness, saga, 2);
        subscription.start().await.unwrap();

        assert_eq!(subscription.poll_once().await.unwrap().retried, 1);
        assert_eq!(subscription.poll_once().await.unwrap().parked, 1);

        assert_eq!(harness.log.parked("saga-FlakySaga").await.unwrap(), vec![1]);
        assert!(subscription.poll_once().await.unwrap().is_idle());
    }

    #[tokio::test]
    async fn test_domain_rejection_is_parked_without_redelivery() {
        let harness = harness();
        register(&harness).await;
        register(&harness).await;
        let saga = Arc::new(Flaky::new(1, rejected));
        let subscription = subscription(&harness, saga.clone(), 5);
        subscription.start().await.unwrap();

        let outcome = subscription.poll_once().await.unwrap();

        assert_eq!(outcome, PollOutcome { processed: 1, retried: 0, parked: 1 });
        assert_eq!(saga.runs.load(Ordering::SeqCst), 2);
        assert_eq!(harness.log.parked("saga-FlakySaga").await.unwrap(), vec![1]);
        assert!(subscription.poll_once().await.unwrap().is_idle());
    }

    #[tokio::test]
    async fn test_missing_target_aggregate_is_redelivered() {
        let harness = harness();
        register(&harness).await;
        let saga = Arc::new(Flaky::new(1, month_not_started));
        let subscription = subscription(&harness, saga.clone(), 5);
        subscription.start().await.unwrap();

        assert_eq!(subscription.poll_once().await.unwrap().retried, 1);
        assert_eq!(subscription.poll_once().await.unwrap().processed, 1);
        assert!(harness.log.parked("saga-FlakySaga").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_event_is_parked_immediately() {
        let harness = harness();
        let log: &InMemoryEventLog = &harness.log;
        log.append_to_stream(
            &stream_name("account", Uuid::new_v4()),
            ExpectedRevision::NoStream,
            vec![EventData::json(
                "new_account_registered",
                br#"{"broken":true}"#.to_vec(),
                vec![],
                Utc::now(),
            )],
        )
        .await
        .unwrap();
        let subscription = subscription(&harness, Arc::new(AccountRegisteredSaga), 5);
        subscription.start().await.unwrap();

        let outcome = subscription.poll_once().await.unwrap();

        assert_eq!(outcome.parked, 1);
        assert_eq!(
            harness.log.parked("saga-AccountRegisterSaga").await.unwrap(),
            vec![1]
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let harness = harness();
        register(&harness).await;
        let subscription = Arc::new(subscription(&harness, Arc::new(AccountRegisteredSaga), 3));
        let shutdown = CancellationToken::new();

        let handle = subscription.clone().spawn(shutdown.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();

        handle.await.unwrap().unwrap();
        assert_eq!(harness.log.len().await, 2);
    }
}

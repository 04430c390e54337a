//! PostgreSQL event log
//!
//! `stream_events` holds every event; the `(stream_name, revision)` unique
//! constraint makes a concurrent append with a stale expectation fail.
//! Appends take a transaction-scoped advisory lock so that global positions
//! become visible in commit order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::log::{EventLog, ExpectedRevision, NackAction, PersistentSubscriptions};
use super::{EventData, LogError, RecordedEvent};

/// Advisory lock key serializing appends
const APPEND_LOCK_KEY: i64 = 0x5741_4c4c_4554;

/// Postgres unique_violation
const UNIQUE_VIOLATION: &str = "23505";

type EventRow = (
    i64,
    String,
    i64,
    String,
    String,
    Vec<u8>,
    Vec<u8>,
    DateTime<Utc>,
);

fn into_recorded(row: EventRow) -> RecordedEvent {
    let (position, stream_id, revision, event_type, content_type, data, metadata, created_at) = row;
    RecordedEvent {
        stream_id,
        revision: revision as u64,
        position: position as u64,
        event_type,
        content_type,
        data,
        metadata,
        created_at,
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db_err| db_err.code())
        .map(|code| code == UNIQUE_VIOLATION)
        .unwrap_or(false)
}

/// Event log backed by PostgreSQL
#[derive(Debug, Clone)]
pub struct PgEventLog {
    pool: PgPool,
}

impl PgEventLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_revision(
        tx: &mut Transaction<'_, Postgres>,
        stream: &str,
    ) -> Result<Option<u64>, sqlx::Error> {
        let current: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(revision) FROM stream_events WHERE stream_name = $1
            "#,
        )
        .bind(stream)
        .fetch_one(&mut **tx)
        .await?;

        Ok(current.map(|revision| revision as u64))
    }

    async fn require_group(&self, group: &str) -> Result<(i64, Vec<String>), LogError> {
        let row: Option<(i64, Vec<String>)> = sqlx::query_as(
            r#"
            SELECT checkpoint, event_types FROM subscription_groups WHERE group_name = $1
            "#,
        )
        .bind(group)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| LogError::GroupNotFound(group.to_string()))
    }
}

#[async_trait]
impl EventLog for PgEventLog {
    async fn append_to_stream(
        &self,
        stream: &str,
        expected: ExpectedRevision,
        events: Vec<EventData>,
    ) -> Result<u64, LogError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(APPEND_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let current = Self::current_revision(&mut tx, stream).await?;
        if !expected.matches(current) {
            return Err(LogError::WrongExpectedVersion {
                stream: stream.to_string(),
                expected,
                actual: current,
            });
        }

        let mut revision = current.map(|last| last + 1).unwrap_or(0);
        let mut last_written = current;

        for event in events {
            let inserted = sqlx::query(
                r#"
                INSERT INTO stream_events (
                    stream_name, revision, event_type, content_type,
                    data, metadata, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(stream)
            .bind(revision as i64)
            .bind(&event.event_type)
            .bind(&event.content_type)
            .bind(&event.data)
            .bind(&event.metadata)
            .bind(event.created_at)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {
                    return Err(LogError::WrongExpectedVersion {
                        stream: stream.to_string(),
                        expected,
                        actual: None,
                    });
                }
                Err(err) => return Err(err.into()),
            }

            last_written = Some(revision);
            revision += 1;
        }

        tx.commit().await?;

        Ok(last_written.unwrap_or(0))
    }

    async fn read_stream(
        &self,
        stream: &str,
        from_revision: u64,
        max_count: usize,
    ) -> Result<Vec<RecordedEvent>, LogError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT position, stream_name, revision, event_type, content_type, data, metadata, created_at
            FROM stream_events
            WHERE stream_name = $1 AND revision >= $2
            ORDER BY revision ASC
            LIMIT $3
            "#,
        )
        .bind(stream)
        .bind(from_revision as i64)
        .bind(max_count as i64)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM stream_events WHERE stream_name = $1)",
            )
            .bind(stream)
            .fetch_one(&self.pool)
            .await?;

            if !exists {
                return Err(LogError::StreamNotFound(stream.to_string()));
            }
        }

        Ok(rows.into_iter().map(into_recorded).collect())
    }
}

#[async_trait]
impl PersistentSubscriptions for PgEventLog {
    async fn create_group(&self, group: &str, event_types: &[&str]) -> Result<(), LogError> {
        let event_types: Vec<String> = event_types.iter().map(|t| t.to_string()).collect();

        sqlx::query(
            r#"
            INSERT INTO subscription_groups (group_name, event_types, checkpoint)
            VALUES ($1, $2, 0)
            ON CONFLICT (group_name) DO UPDATE SET event_types = EXCLUDED.event_types
            "#,
        )
        .bind(group)
        .bind(&event_types)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn receive(&self, group: &str, max_count: usize) -> Result<Vec<RecordedEvent>, LogError> {
        let (checkpoint, event_types) = self.require_group(group).await?;

        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT position, stream_name, revision, event_type, content_type, data, metadata, created_at
            FROM stream_events
            WHERE position > $1 AND event_type = ANY($2)
            ORDER BY position ASC
            LIMIT $3
            "#,
        )
        .bind(checkpoint)
        .bind(&event_types)
        .bind(max_count as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(into_recorded).collect())
    }

    async fn ack(&self, group: &str, position: u64) -> Result<(), LogError> {
        let result = sqlx::query(
            r#"
            UPDATE subscription_groups
            SET checkpoint = GREATEST(checkpoint, $2)
            WHERE group_name = $1
            "#,
        )
        .bind(group)
        .bind(position as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LogError::GroupNotFound(group.to_string()));
        }

        Ok(())
    }

    async fn nack(
        &self,
        group: &str,
        position: u64,
        action: NackAction,
        reason: &str,
    ) -> Result<(), LogError> {
        match action {
            NackAction::Retry => {
                self.require_group(group).await?;
                tracing::debug!(group, position, reason, "Event left for redelivery");
                Ok(())
            }
            NackAction::Park => {
                let mut tx = self.pool.begin().await?;

                sqlx::query(
                    r#"
                    INSERT INTO parked_events (group_name, position, reason)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (group_name, position) DO NOTHING
                    "#,
                )
                .bind(group)
                .bind(position as i64)
                .bind(reason)
                .execute(&mut *tx)
                .await?;

                let result = sqlx::query(
                    r#"
                    UPDATE subscription_groups
                    SET checkpoint = GREATEST(checkpoint, $2)
                    WHERE group_name = $1
                    "#,
                )
                .bind(group)
                .bind(position as i64)
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(LogError::GroupNotFound(group.to_string()));
                }

                tx.commit().await?;
                Ok(())
            }
        }
    }

    async fn parked(&self, group: &str) -> Result<Vec<u64>, LogError> {
        let positions: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT position FROM parked_events WHERE group_name = $1 ORDER BY position ASC
            "#,
        )
        .bind(group)
        .fetch_all(&self.pool)
        .await?;

        Ok(positions.into_iter().map(|p| p as u64).collect())
    }
}

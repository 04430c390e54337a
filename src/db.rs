//! Database module
//!
//! Connection check and schema bootstrap for the PostgreSQL event log.

use sqlx::PgPool;

/// Tables the event log needs
const REQUIRED_TABLES: [&str; 3] = ["stream_events", "subscription_groups", "parked_events"];

const SCHEMA: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS stream_events (
        position     BIGSERIAL PRIMARY KEY,
        stream_name  TEXT        NOT NULL,
        revision     BIGINT      NOT NULL,
        event_type   TEXT        NOT NULL,
        content_type TEXT        NOT NULL,
        data         BYTEA       NOT NULL,
        metadata     BYTEA       NOT NULL,
        created_at   TIMESTAMPTZ NOT NULL,
        UNIQUE (stream_name, revision)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS stream_events_event_type_idx
        ON stream_events (event_type, position)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS subscription_groups (
        group_name  TEXT PRIMARY KEY,
        event_types TEXT[] NOT NULL,
        checkpoint  BIGINT NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS parked_events (
        group_name TEXT        NOT NULL,
        position   BIGINT      NOT NULL,
        reason     TEXT        NOT NULL,
        parked_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (group_name, position)
    )
    "#,
];

/// This function can be used to verify database connectivity
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Create the event log tables if they do not exist yet
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for statement in SCHEMA {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    tracing::debug!("Event log schema ensured");
    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    Ok(true)
}

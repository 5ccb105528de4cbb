//! PostgreSQL Event Store
//!
//! Event log and snapshot table in PostgreSQL. The unique constraint on
//! `(aggregate_id, aggregate_version)` is what detects concurrent writers;
//! a violation rolls back the whole batch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::snapshot::{Snapshot, SnapshotPolicy, SnapshotStore};

use super::store::validate_batch;
use super::{EventStore, EventStoreError, NewEvent, RecordedEvent};

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    sequence: i64,
    aggregate_type: String,
    aggregate_id: Uuid,
    aggregate_version: i64,
    name: String,
    schema_version: i32,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<EventRow> for RecordedEvent {
    fn from(row: EventRow) -> Self {
        Self {
            sequence: row.sequence,
            aggregate_type: row.aggregate_type,
            aggregate_id: row.aggregate_id,
            aggregate_version: row.aggregate_version,
            name: row.name,
            schema_version: row.schema_version,
            payload: row.payload,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    aggregate_type: String,
    aggregate_id: Uuid,
    aggregate_version: i64,
    state: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<SnapshotRow> for Snapshot {
    fn from(row: SnapshotRow) -> Self {
        Self {
            aggregate_type: row.aggregate_type,
            aggregate_id: row.aggregate_id,
            aggregate_version: row.aggregate_version,
            state: row.state,
            created_at: row.created_at,
        }
    }
}

/// Event Store for persisting and retrieving events and snapshots
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
    policy: SnapshotPolicy,
}

impl PgEventStore {
    /// Create a new PgEventStore with the replace snapshot policy
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            policy: SnapshotPolicy::Replace,
        }
    }

    /// Create a new PgEventStore with an explicit snapshot policy
    pub fn with_policy(pool: PgPool, policy: SnapshotPolicy) -> Self {
        Self { pool, policy }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a batch on an open transaction
    async fn insert_events(
        conn: &mut PgConnection,
        events: &[NewEvent],
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let mut recorded = Vec::with_capacity(events.len());

        for event in events {
            let row: EventRow = sqlx::query_as(
                r#"
                INSERT INTO events (
                    aggregate_type, aggregate_id, aggregate_version,
                    name, schema_version, payload
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING sequence, aggregate_type, aggregate_id, aggregate_version,
                          name, schema_version, payload, created_at
                "#,
            )
            .bind(&event.aggregate_type)
            .bind(event.aggregate_id)
            .bind(event.aggregate_version)
            .bind(&event.name)
            .bind(event.schema_version)
            .bind(&event.payload)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| map_insert_error(e, event))?;

            recorded.push(row.into());
        }

        Ok(recorded)
    }

    /// Write a snapshot on an open transaction according to `policy`
    async fn write_snapshot(
        conn: &mut PgConnection,
        policy: SnapshotPolicy,
        snapshot: &Snapshot,
    ) -> Result<(), EventStoreError> {
        if policy == SnapshotPolicy::Replace {
            sqlx::query(
                r#"
                DELETE FROM snapshots
                WHERE aggregate_type = $1 AND aggregate_id = $2
                "#,
            )
            .bind(&snapshot.aggregate_type)
            .bind(snapshot.aggregate_id)
            .execute(&mut *conn)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO snapshots (aggregate_type, aggregate_id, aggregate_version, state, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (aggregate_type, aggregate_id, aggregate_version)
            DO UPDATE SET state = EXCLUDED.state, created_at = EXCLUDED.created_at
            "#,
        )
        .bind(&snapshot.aggregate_type)
        .bind(snapshot.aggregate_id)
        .bind(snapshot.aggregate_version)
        .bind(&snapshot.state)
        .bind(snapshot.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

/// A unique violation on insert means another writer took the version
fn map_insert_error(error: sqlx::Error, event: &NewEvent) -> EventStoreError {
    let unique_violation = error
        .as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false);

    if unique_violation {
        EventStoreError::ConcurrencyConflict {
            aggregate_id: event.aggregate_id,
            version: event.aggregate_version,
        }
    } else {
        EventStoreError::Database(error)
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(
        &self,
        aggregate_id: Uuid,
        events: &[NewEvent],
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        validate_batch(aggregate_id, events)?;
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let recorded = Self::insert_events(&mut tx, events).await?;
        tx.commit().await?;

        tracing::debug!(
            aggregate_id = %aggregate_id,
            count = recorded.len(),
            "Events appended"
        );

        Ok(recorded)
    }

    async fn append_with_snapshot(
        &self,
        aggregate_id: Uuid,
        events: &[NewEvent],
        snapshot: &Snapshot,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        validate_batch(aggregate_id, events)?;

        let mut tx = self.pool.begin().await?;
        let recorded = Self::insert_events(&mut tx, events).await?;
        Self::write_snapshot(&mut tx, self.policy, snapshot).await?;
        tx.commit().await?;

        tracing::info!(
            aggregate_id = %aggregate_id,
            version = snapshot.aggregate_version,
            "Events appended with snapshot"
        );

        Ok(recorded)
    }

    async fn load_tail(
        &self,
        aggregate_id: Uuid,
        since_version: i64,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT sequence, aggregate_type, aggregate_id, aggregate_version,
                   name, schema_version, payload, created_at
            FROM events
            WHERE aggregate_id = $1 AND aggregate_version > $2
            ORDER BY aggregate_version ASC
            "#,
        )
        .bind(aggregate_id)
        .bind(since_version)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RecordedEvent::from).collect())
    }

    async fn load_by_name(
        &self,
        names: &[String],
        since_sequence: i64,
        page_size: i64,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT sequence, aggregate_type, aggregate_id, aggregate_version,
                   name, schema_version, payload, created_at
            FROM events
            WHERE name = ANY($1) AND sequence > $2
            ORDER BY sequence ASC
            LIMIT $3
            "#,
        )
        .bind(names)
        .bind(since_sequence)
        .bind(page_size)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RecordedEvent::from).collect())
    }

    async fn list_aggregate_ids(
        &self,
        aggregate_type: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Uuid>, EventStoreError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT aggregate_id
            FROM events
            WHERE aggregate_type = $1
            ORDER BY aggregate_id ASC
            OFFSET $2
            LIMIT $3
            "#,
        )
        .bind(aggregate_type)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

#[async_trait]
impl SnapshotStore for PgEventStore {
    async fn get_latest(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Option<Snapshot>, EventStoreError> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            r#"
            SELECT aggregate_type, aggregate_id, aggregate_version, state, created_at
            FROM snapshots
            WHERE aggregate_type = $1 AND aggregate_id = $2
            ORDER BY aggregate_version DESC
            LIMIT 1
            "#,
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Snapshot::from))
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), EventStoreError> {
        let mut tx = self.pool.begin().await?;
        Self::write_snapshot(&mut tx, self.policy, snapshot).await?;
        tx.commit().await?;

        tracing::info!(
            aggregate_type = %snapshot.aggregate_type,
            aggregate_id = %snapshot.aggregate_id,
            version = snapshot.aggregate_version,
            "Snapshot saved"
        );

        Ok(())
    }

    async fn list_latest(
        &self,
        aggregate_type: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Snapshot>, EventStoreError> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(
            r#"
            SELECT DISTINCT ON (aggregate_id)
                   aggregate_type, aggregate_id, aggregate_version, state, created_at
            FROM snapshots
            WHERE aggregate_type = $1
            ORDER BY aggregate_id ASC, aggregate_version DESC
            OFFSET $2
            LIMIT $3
            "#,
        )
        .bind(aggregate_type)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Snapshot::from).collect())
    }
}

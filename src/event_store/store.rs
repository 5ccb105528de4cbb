//! Event Store contract
//!
//! Types shared by every event store backend and the trait they implement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DomainError, DomainEvent};
use crate::snapshot::Snapshot;

use super::EventStoreError;

/// Default page size for `load_by_name`
pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// An event that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub aggregate_version: i64,
    pub name: String,
    pub schema_version: i32,
    pub payload: serde_json::Value,
}

impl NewEvent {
    /// Build a storable event from a typed domain event
    pub fn from_domain<E: DomainEvent>(
        aggregate_type: &str,
        aggregate_id: Uuid,
        aggregate_version: i64,
        event: &E,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            aggregate_type: aggregate_type.to_string(),
            aggregate_id,
            aggregate_version,
            name: event.name().to_string(),
            schema_version: event.schema_version(),
            payload: event.payload()?,
        })
    }
}

/// Event as stored in the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Global sequence, assigned at append
    pub sequence: i64,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub aggregate_version: i64,
    pub name: String,
    pub schema_version: i32,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl RecordedEvent {
    /// Decode the payload through the event type's registry
    pub fn decode<E: DomainEvent>(&self) -> Result<E, DomainError> {
        E::registry().decode(&self.name, self.schema_version, &self.payload)
    }
}

/// Append-only event log
///
/// Implementations must insert a batch atomically and reject it as a whole
/// when any `(aggregate_id, aggregate_version)` already exists. That check is
/// the only concurrency control between writers.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append a batch of events for one aggregate
    async fn append(
        &self,
        aggregate_id: Uuid,
        events: &[NewEvent],
    ) -> Result<Vec<RecordedEvent>, EventStoreError>;

    /// Append a batch and write a snapshot as one atomic unit
    async fn append_with_snapshot(
        &self,
        aggregate_id: Uuid,
        events: &[NewEvent],
        snapshot: &Snapshot,
    ) -> Result<Vec<RecordedEvent>, EventStoreError>;

    /// Events with `aggregate_version > since_version`, ascending
    async fn load_tail(
        &self,
        aggregate_id: Uuid,
        since_version: i64,
    ) -> Result<Vec<RecordedEvent>, EventStoreError>;

    /// Events whose name is in `names` with `sequence > since_sequence`,
    /// ascending, at most `page_size`. An empty page means caught up.
    async fn load_by_name(
        &self,
        names: &[String],
        since_sequence: i64,
        page_size: i64,
    ) -> Result<Vec<RecordedEvent>, EventStoreError>;

    /// Distinct aggregate ids of one type found in the log, ordered by id
    async fn list_aggregate_ids(
        &self,
        aggregate_type: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Uuid>, EventStoreError>;
}

/// Reject batches that cannot be a valid append for `aggregate_id`
pub(crate) fn validate_batch(aggregate_id: Uuid, events: &[NewEvent]) -> Result<(), EventStoreError> {
    if aggregate_id.is_nil() {
        return Err(EventStoreError::EmptyAggregateId);
    }

    let mut previous: Option<i64> = None;
    for event in events {
        if event.aggregate_id != aggregate_id {
            return Err(EventStoreError::InvalidBatch(format!(
                "event for aggregate {} in batch for {}",
                event.aggregate_id, aggregate_id
            )));
        }
        if event.aggregate_version < 1 {
            return Err(EventStoreError::InvalidBatch(format!(
                "aggregate version {} is not 1-based",
                event.aggregate_version
            )));
        }
        if let Some(prev) = previous {
            if event.aggregate_version != prev + 1 {
                return Err(EventStoreError::InvalidBatch(format!(
                    "aggregate version {} does not follow {}",
                    event.aggregate_version, prev
                )));
            }
        }
        previous = Some(event.aggregate_version);
    }

    Ok(())
}

//! Snapshot module
//!
//! Full-state captures of an aggregate at a version, used to bound replay
//! cost, plus the cadence that decides when to take one.

mod cadence;

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::domain::DomainError;
use crate::event_store::EventStoreError;

pub use cadence::SnapshotCadence;

/// Captured aggregate state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    /// Version captured by `state`
    pub aggregate_version: i64,
    pub state: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Capture the full current state of an aggregate.
    ///
    /// Fails with [`DomainError::EmptyAggregate`] when the aggregate has no id.
    pub fn capture<A: Aggregate>(aggregate: &A) -> Result<Self, DomainError> {
        if aggregate.id().is_nil() {
            return Err(DomainError::EmptyAggregate);
        }

        Ok(Self {
            aggregate_type: A::aggregate_type().to_string(),
            aggregate_id: aggregate.id(),
            aggregate_version: aggregate.version(),
            state: serde_json::to_value(aggregate)?,
            created_at: Utc::now(),
        })
    }

    /// Restore the aggregate captured by this snapshot
    pub fn restore<A: Aggregate>(&self) -> Result<A, DomainError> {
        let mut aggregate: A = serde_json::from_value(self.state.clone())?;
        aggregate.set_version(self.aggregate_version);
        Ok(aggregate)
    }
}

/// How snapshots are kept per aggregate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SnapshotPolicy {
    /// Single row per aggregate, overwritten on every snapshot
    #[default]
    Replace,
    /// One row per snapshot; the latest is the highest version
    Append,
}

impl FromStr for SnapshotPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "append" => Ok(Self::Append),
            other => Err(format!("unknown snapshot policy: {}", other)),
        }
    }
}

/// Snapshot persistence
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Highest-version snapshot for the aggregate, if any
    async fn get_latest(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Option<Snapshot>, EventStoreError>;

    /// Persist a snapshot; `get_latest` returns it afterwards
    async fn save(&self, snapshot: &Snapshot) -> Result<(), EventStoreError>;

    /// Latest snapshot per aggregate of one type, ordered by aggregate id
    async fn list_latest(
        &self,
        aggregate_type: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Snapshot>, EventStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_policy_from_str() {
        assert_eq!("replace".parse::<SnapshotPolicy>(), Ok(SnapshotPolicy::Replace));
        assert_eq!("APPEND".parse::<SnapshotPolicy>(), Ok(SnapshotPolicy::Append));
        assert!("rotate".parse::<SnapshotPolicy>().is_err());
        assert_eq!(SnapshotPolicy::default(), SnapshotPolicy::Replace);
    }
}

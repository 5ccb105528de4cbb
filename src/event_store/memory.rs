//! In-memory Event Store
//!
//! Process-local event log and snapshot table behind one `RwLock`, so an
//! append and its snapshot are applied under the same lock scope. Used by
//! tests and by embedders that do not need durability.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::snapshot::{Snapshot, SnapshotPolicy, SnapshotStore};

use super::store::validate_batch;
use super::{EventStore, EventStoreError, NewEvent, RecordedEvent};

#[derive(Debug, Default)]
struct Tables {
    events: Vec<RecordedEvent>,
    snapshots: Vec<Snapshot>,
    last_sequence: i64,
}

#[derive(Debug, Default)]
struct Counters {
    appends: AtomicU64,
    tail_loads: AtomicU64,
    name_loads: AtomicU64,
    snapshot_loads: AtomicU64,
    snapshot_writes: AtomicU64,
}

/// Number of calls served by an [`InMemoryEventStore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub appends: u64,
    pub tail_loads: u64,
    pub name_loads: u64,
    pub snapshot_loads: u64,
    pub snapshot_writes: u64,
}

/// In-memory event and snapshot store
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventStore {
    tables: Arc<RwLock<Tables>>,
    counters: Arc<Counters>,
    policy: SnapshotPolicy,
}

impl InMemoryEventStore {
    /// Create an empty store with the replace snapshot policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with the given snapshot policy
    pub fn with_policy(policy: SnapshotPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Call counters
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            appends: self.counters.appends.load(Ordering::Relaxed),
            tail_loads: self.counters.tail_loads.load(Ordering::Relaxed),
            name_loads: self.counters.name_loads.load(Ordering::Relaxed),
            snapshot_loads: self.counters.snapshot_loads.load(Ordering::Relaxed),
            snapshot_writes: self.counters.snapshot_writes.load(Ordering::Relaxed),
        }
    }

    /// Every stored event in sequence order
    pub async fn all_events(&self) -> Vec<RecordedEvent> {
        self.tables.read().await.events.clone()
    }

    /// Every stored snapshot row
    pub async fn all_snapshots(&self) -> Vec<Snapshot> {
        self.tables.read().await.snapshots.clone()
    }

    /// Test-only: append raw events without batch validation, so payloads
    /// and schema versions the aggregates would never emit can be stored.
    /// Versions already in the log are still rejected.
    #[cfg(test)]
    pub(crate) async fn seed(&self, events: &[NewEvent]) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let mut tables = self.tables.write().await;
        Self::insert_batch(&mut tables, events)
    }

    fn insert_batch(
        tables: &mut Tables,
        events: &[NewEvent],
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        // Check the whole batch first so a conflict leaves no partial insert
        let mut batch = BTreeSet::new();
        for event in events {
            let taken = tables.events.iter().any(|e| {
                e.aggregate_id == event.aggregate_id
                    && e.aggregate_version == event.aggregate_version
            });
            if taken || !batch.insert((event.aggregate_id, event.aggregate_version)) {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: event.aggregate_id,
                    version: event.aggregate_version,
                });
            }
        }

        let now = Utc::now();
        let mut recorded = Vec::with_capacity(events.len());
        for event in events {
            tables.last_sequence += 1;
            let stored = RecordedEvent {
                sequence: tables.last_sequence,
                aggregate_type: event.aggregate_type.clone(),
                aggregate_id: event.aggregate_id,
                aggregate_version: event.aggregate_version,
                name: event.name.clone(),
                schema_version: event.schema_version,
                payload: event.payload.clone(),
                created_at: now,
            };
            tables.events.push(stored.clone());
            recorded.push(stored);
        }

        Ok(recorded)
    }

    fn write_snapshot(tables: &mut Tables, policy: SnapshotPolicy, snapshot: &Snapshot) {
        let same_aggregate = |s: &Snapshot| {
            s.aggregate_type == snapshot.aggregate_type && s.aggregate_id == snapshot.aggregate_id
        };
        match policy {
            SnapshotPolicy::Replace => tables.snapshots.retain(|s| !same_aggregate(s)),
            SnapshotPolicy::Append => tables.snapshots.retain(|s| {
                !(same_aggregate(s) && s.aggregate_version == snapshot.aggregate_version)
            }),
        }
        tables.snapshots.push(snapshot.clone());
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        aggregate_id: Uuid,
        events: &[NewEvent],
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        validate_batch(aggregate_id, events)?;
        self.counters.appends.fetch_add(1, Ordering::Relaxed);

        let mut tables = self.tables.write().await;
        Self::insert_batch(&mut tables, events)
    }

    async fn append_with_snapshot(
        &self,
        aggregate_id: Uuid,
        events: &[NewEvent],
        snapshot: &Snapshot,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        validate_batch(aggregate_id, events)?;
        self.counters.appends.fetch_add(1, Ordering::Relaxed);

        let mut tables = self.tables.write().await;
        let recorded = Self::insert_batch(&mut tables, events)?;
        Self::write_snapshot(&mut tables, self.policy, snapshot);
        self.counters.snapshot_writes.fetch_add(1, Ordering::Relaxed);

        Ok(recorded)
    }

    async fn load_tail(
        &self,
        aggregate_id: Uuid,
        since_version: i64,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        self.counters.tail_loads.fetch_add(1, Ordering::Relaxed);

        let tables = self.tables.read().await;
        let mut tail: Vec<RecordedEvent> = tables
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id && e.aggregate_version > since_version)
            .cloned()
            .collect();
        tail.sort_by_key(|e| e.aggregate_version);

        Ok(tail)
    }

    async fn load_by_name(
        &self,
        names: &[String],
        since_sequence: i64,
        page_size: i64,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        self.counters.name_loads.fetch_add(1, Ordering::Relaxed);

        let tables = self.tables.read().await;
        let page = tables
            .events
            .iter()
            .filter(|e| e.sequence > since_sequence && names.contains(&e.name))
            .take(page_size.max(0) as usize)
            .cloned()
            .collect();

        Ok(page)
    }

    async fn list_aggregate_ids(
        &self,
        aggregate_type: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Uuid>, EventStoreError> {
        let tables = self.tables.read().await;
        let ids: BTreeSet<Uuid> = tables
            .events
            .iter()
            .filter(|e| e.aggregate_type == aggregate_type)
            .map(|e| e.aggregate_id)
            .collect();

        Ok(ids
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}

#[async_trait]
impl SnapshotStore for InMemoryEventStore {
    async fn get_latest(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Option<Snapshot>, EventStoreError> {
        self.counters.snapshot_loads.fetch_add(1, Ordering::Relaxed);

        let tables = self.tables.read().await;
        let latest = tables
            .snapshots
            .iter()
            .filter(|s| s.aggregate_type == aggregate_type && s.aggregate_id == aggregate_id)
            .max_by_key(|s| s.aggregate_version)
            .cloned();

        Ok(latest)
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), EventStoreError> {
        let mut tables = self.tables.write().await;
        Self::write_snapshot(&mut tables, self.policy, snapshot);
        self.counters.snapshot_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn list_latest(
        &self,
        aggregate_type: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Snapshot>, EventStoreError> {
        let tables = self.tables.read().await;

        let mut latest: BTreeMap<Uuid, &Snapshot> = BTreeMap::new();
        for snapshot in tables.snapshots.iter().filter(|s| s.aggregate_type == aggregate_type) {
            let newer = latest
                .get(&snapshot.aggregate_id)
                .map_or(true, |current| snapshot.aggregate_version > current.aggregate_version);
            if newer {
                latest.insert(snapshot.aggregate_id, snapshot);
            }
        }

        Ok(latest
            .into_values()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

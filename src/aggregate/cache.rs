//! Aggregate Cache
//!
//! Process-scoped cache of built aggregates, keyed by id.
//!
//! The cache is an optimization only. It lives as long as the process, is
//! never invalidated by other processes, and assumes each aggregate id has a
//! single logical writer doing read-modify-write. Concurrent tasks can still
//! interleave between a `get` and a `put`; conflicting writes are caught by
//! the event store's `(aggregate_id, aggregate_version)` uniqueness check,
//! never by this cache.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::Aggregate;

/// Shared, cloneable aggregate cache
#[derive(Debug, Clone)]
pub struct AggregateCache<A> {
    entries: Arc<RwLock<HashMap<Uuid, A>>>,
}

impl<A: Aggregate> AggregateCache<A> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Cached copy of the aggregate
    pub async fn get(&self, id: Uuid) -> Option<A> {
        self.entries.read().await.get(&id).cloned()
    }

    /// Store an aggregate. Empty aggregates are ignored.
    pub async fn put(&self, aggregate: A) {
        if aggregate.is_empty() {
            return;
        }
        self.entries.write().await.insert(aggregate.id(), aggregate);
    }

    /// Drop one entry
    pub async fn invalidate(&self, id: Uuid) {
        self.entries.write().await.remove(&id);
    }

    /// Drop every entry
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<A: Aggregate> Default for AggregateCache<A> {
    fn default() -> Self {
        Self::new()
    }
}

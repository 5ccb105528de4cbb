//! Aggregate Repository
//!
//! Builds aggregates from snapshot + trailing events (or from the cache plus
//! an incremental tail) and saves new events with a conditional snapshot.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::DomainError;
use crate::event_store::{EventStore, EventStoreError, NewEvent, RecordedEvent};
use crate::snapshot::{Snapshot, SnapshotStore};

use super::{Aggregate, AggregateCache};

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] EventStoreError),
}

impl RepositoryError {
    /// Another writer extended the aggregate first
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, RepositoryError::Store(e) if e.is_concurrency_conflict())
    }
}

/// Repository for one aggregate type
pub struct AggregateRepository<A: Aggregate> {
    events: Arc<dyn EventStore>,
    snapshots: Arc<dyn SnapshotStore>,
    cache: AggregateCache<A>,
}

impl<A: Aggregate> Clone for AggregateRepository<A> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
            snapshots: Arc::clone(&self.snapshots),
            cache: self.cache.clone(),
        }
    }
}

impl<A: Aggregate> AggregateRepository<A> {
    /// Create a repository from its collaborators
    pub fn new(
        events: Arc<dyn EventStore>,
        snapshots: Arc<dyn SnapshotStore>,
        cache: AggregateCache<A>,
    ) -> Self {
        Self {
            events,
            snapshots,
            cache,
        }
    }

    /// Create a repository over a store that keeps both events and snapshots
    pub fn with_store<S>(store: S, cache: AggregateCache<A>) -> Self
    where
        S: EventStore + SnapshotStore + Clone + 'static,
    {
        Self::new(Arc::new(store.clone()), Arc::new(store), cache)
    }

    pub fn cache(&self) -> &AggregateCache<A> {
        &self.cache
    }

    /// Build an aggregate by id.
    ///
    /// A nil id returns a fresh empty aggregate without any I/O. An id with no
    /// history also returns an empty aggregate.
    pub async fn build(&self, id: Uuid) -> Result<A, RepositoryError> {
        if id.is_nil() {
            return Ok(A::default());
        }

        if let Some(cached) = self.cache.get(id).await {
            let tail = self.events.load_tail(id, cached.version()).await?;
            if tail.is_empty() {
                tracing::debug!(aggregate_id = %id, version = cached.version(), "Aggregate served from cache");
                return Ok(cached);
            }

            let aggregate = Self::replay(cached, &tail)?;
            tracing::debug!(
                aggregate_id = %id,
                caught_up = tail.len(),
                version = aggregate.version(),
                "Cached aggregate caught up"
            );
            self.cache.put(aggregate.clone()).await;
            return Ok(aggregate);
        }

        let seed = match self.snapshots.get_latest(A::aggregate_type(), id).await? {
            Some(snapshot) => snapshot.restore::<A>()?,
            None => A::default(),
        };

        let tail = self.events.load_tail(id, seed.version()).await?;
        let aggregate = Self::replay(seed, &tail)?;

        self.cache.put(aggregate.clone()).await;
        Ok(aggregate)
    }

    /// Fold stored events into an aggregate.
    ///
    /// Fails on the first event whose `(name, schema_version)` is unknown or
    /// whose payload cannot be decoded; the partial aggregate is dropped.
    pub fn replay(mut aggregate: A, events: &[RecordedEvent]) -> Result<A, DomainError> {
        for recorded in events {
            let event: A::Event = recorded.decode().map_err(|e| {
                tracing::error!(
                    aggregate_id = %recorded.aggregate_id,
                    sequence = recorded.sequence,
                    error = %e,
                    "Replay aborted"
                );
                e
            })?;
            aggregate.apply(&event);
            aggregate.set_version(aggregate.version() + 1);
        }

        Ok(aggregate)
    }

    /// Persist new events produced by a business method.
    ///
    /// Versions `current + 1 ..= current + n` are assigned in order. When the
    /// aggregate's snapshot cadence fires, the snapshot is written in the
    /// same atomic unit as the events. The aggregate's version and the cache
    /// change only after the store accepted the batch. A concurrency
    /// conflict is returned to the caller, never retried here.
    pub async fn save(
        &self,
        aggregate: &mut A,
        new_events: Vec<A::Event>,
    ) -> Result<Vec<RecordedEvent>, RepositoryError> {
        if aggregate.is_empty() {
            return Err(DomainError::EmptyAggregate.into());
        }
        if new_events.is_empty() {
            return Ok(Vec::new());
        }

        let id = aggregate.id();
        let current = aggregate.version();
        let next_version = current + new_events.len() as i64;

        let stored = new_events
            .iter()
            .zip(current + 1..)
            .map(|(event, version)| NewEvent::from_domain(A::aggregate_type(), id, version, event))
            .collect::<Result<Vec<_>, _>>()?;

        let result = if A::SNAPSHOT_CADENCE.should_snapshot(current, new_events.len()) {
            let mut state = aggregate.clone();
            state.set_version(next_version);
            let snapshot = Snapshot::capture(&state)?;
            self.events.append_with_snapshot(id, &stored, &snapshot).await
        } else {
            self.events.append(id, &stored).await
        };

        let recorded = match result {
            Ok(recorded) => recorded,
            Err(e) => {
                if e.is_concurrency_conflict() {
                    tracing::warn!(aggregate_id = %id, expected_version = current, "Save lost a concurrent write");
                }
                return Err(e.into());
            }
        };

        aggregate.set_version(next_version);
        self.cache.put(aggregate.clone()).await;

        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::User;
    use crate::domain::{UserChanges, UserEvent};
    use crate::event_store::InMemoryEventStore;
    use crate::snapshot::SnapshotPolicy;

    fn repository(store: &InMemoryEventStore) -> AggregateRepository<User> {
        AggregateRepository::with_store(store.clone(), AggregateCache::new())
    }

    fn rename(name: &str) -> UserChanges {
        UserChanges {
            display_name: Some(name.to_string()),
            email: None,
        }
    }

    async fn create_user(repo: &AggregateRepository<User>) -> User {
        let mut user = repo.build(Uuid::nil()).await.unwrap();
        let events = user
            .register(Uuid::new_v4(), "alice".to_string(), "alice@example.com".to_string(), None)
            .unwrap();
        repo.save(&mut user, events).await.unwrap();
        user
    }

    #[tokio::test]
    async fn test_build_nil_id_does_no_io() {
        let store = InMemoryEventStore::new();
        let repo = repository(&store);

        let user = repo.build(Uuid::nil()).await.unwrap();

        assert!(user.is_empty());
        assert_eq!(store.stats(), Default::default());
    }

    #[tokio::test]
    async fn test_build_unknown_id_is_empty_and_not_cached() {
        let store = InMemoryEventStore::new();
        let repo = repository(&store);

        let user = repo.build(Uuid::new_v4()).await.unwrap();

        assert!(user.is_empty());
        assert!(repo.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_save_empty_aggregate_fails() {
        let store = InMemoryEventStore::new();
        let repo = repository(&store);
        let mut user = User::default();

        let result = repo.save(&mut user, Vec::<UserEvent>::new()).await;

        assert!(matches!(
            result,
            Err(RepositoryError::Domain(DomainError::EmptyAggregate))
        ));
        assert!(store.all_events().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_assigns_versions_and_updates_cache() {
        let store = InMemoryEventStore::new();
        let repo = repository(&store);
        let mut user = create_user(&repo).await;

        let events = user.update(rename("Alice")).unwrap();
        let recorded = repo.save(&mut user, events).await.unwrap();

        assert_eq!(user.version(), 2);
        assert_eq!(recorded[0].aggregate_version, 2);
        assert_eq!(recorded[0].name, "UserUpdated");
        assert_eq!(repo.cache().get(user.id()).await, Some(user));
    }

    #[tokio::test]
    async fn test_snapshot_written_at_cadence_boundaries() {
        let store = InMemoryEventStore::with_policy(SnapshotPolicy::Append);
        let repo = repository(&store);
        let mut user = create_user(&repo).await;

        let mut snapshot_versions = Vec::new();
        for i in 2..=15 {
            let events = user.update(rename(&format!("name-{}", i))).unwrap();
            repo.save(&mut user, events).await.unwrap();
            snapshot_versions = store
                .all_snapshots()
                .await
                .iter()
                .map(|s| s.aggregate_version)
                .collect();
        }

        assert_eq!(snapshot_versions, vec![5, 10, 15]);
    }

    #[tokio::test]
    async fn test_losing_writer_gets_conflict() {
        let store = InMemoryEventStore::new();
        let repo = repository(&store);
        let created = create_user(&repo).await;

        // Two writers with their own caches read the same version
        let writer_a = repository(&store);
        let writer_b = repository(&store);
        let mut a = writer_a.build(created.id()).await.unwrap();
        let mut b = writer_b.build(created.id()).await.unwrap();

        let events_a = a.update(rename("from a")).unwrap();
        let events_b = b.update(rename("from b")).unwrap();

        assert!(writer_a.save(&mut a, events_a).await.is_ok());
        let result = writer_b.save(&mut b, events_b).await;

        assert!(result.as_ref().is_err_and(|e| e.is_concurrency_conflict()));
        assert_eq!(b.version(), 1);
        assert_eq!(store.all_events().await.len(), 2);
    }

    #[tokio::test]
    async fn test_second_build_is_served_from_cache() {
        let store = InMemoryEventStore::new();
        let writer = repository(&store);
        let user = create_user(&writer).await;

        let reader = repository(&store);
        reader.build(user.id()).await.unwrap();
        let after_first = store.stats();
        reader.build(user.id()).await.unwrap();
        let after_second = store.stats();

        assert_eq!(after_first.snapshot_loads, 1);
        assert_eq!(after_second.snapshot_loads, 1);
        assert!(after_second.tail_loads - after_first.tail_loads <= 1);
    }

    #[tokio::test]
    async fn test_cached_aggregate_catches_up_incrementally() {
        let store = InMemoryEventStore::new();
        let writer = repository(&store);
        let mut user = create_user(&writer).await;

        let reader = repository(&store);
        assert_eq!(reader.build(user.id()).await.unwrap().version(), 1);

        let events = user.update(rename("Later")).unwrap();
        writer.save(&mut user, events).await.unwrap();

        let caught_up = reader.build(user.id()).await.unwrap();
        assert_eq!(caught_up.version(), 2);
        assert_eq!(caught_up.display_name(), Some("Later"));
    }

    #[tokio::test]
    async fn test_unknown_event_aborts_build() {
        let store = InMemoryEventStore::new();
        let repo = repository(&store);
        let user = create_user(&repo).await;

        store
            .seed(&[NewEvent {
                aggregate_type: "User".to_string(),
                aggregate_id: user.id(),
                aggregate_version: 2,
                name: "UserRenamed".to_string(),
                schema_version: 1,
                payload: serde_json::json!({}),
            }])
            .await
            .unwrap();

        let fresh = repository(&store);
        let result = fresh.build(user.id()).await;

        assert!(matches!(
            result,
            Err(RepositoryError::Domain(DomainError::UnprocessableEvent { .. }))
        ));
        assert!(fresh.cache().is_empty().await);
    }
}

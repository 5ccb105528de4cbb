//! User profile projection
//!
//! Keeps `user_profiles` in sync with the `User` event stream, either per
//! event through [`UserProjection::handle`] or in bulk through
//! [`UserProjection::rebuild`].

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::aggregate::{Aggregate, AggregateRepository, User};
use crate::domain::{DomainError, DomainEvent, UserEvent};
use crate::event_store::{EventStore, RecordedEvent, DEFAULT_PAGE_SIZE};
use crate::snapshot::SnapshotStore;

use super::policy::{DriftPolicy, RebuildStrategy, RetryPolicy};
use super::store::{CursorStore, UserProfileStore};
use super::{ProjectionError, UserProfile, UserProfilePatch};

/// Cursor key of this projection
pub const PROJECTION_NAME: &str = "user_profiles";

/// Outcome of a rebuild pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub created: usize,
    pub updated: usize,
    /// Events that could not be applied (bad payload or missing row)
    pub skipped: usize,
    /// Events the table already reflected
    pub already_applied: usize,
    /// Updates rejected by the version check
    pub drifted: usize,
    /// Last global sequence consumed (0 for a full copy with no events)
    pub last_sequence: i64,
}

impl RebuildReport {
    /// Number of rows written
    pub fn applied(&self) -> usize {
        self.created + self.updated
    }
}

/// User profile read model service
#[derive(Clone)]
pub struct UserProjection {
    store: Arc<dyn UserProfileStore>,
    events: Arc<dyn EventStore>,
    snapshots: Arc<dyn SnapshotStore>,
    cursors: Arc<dyn CursorStore>,
    retry: RetryPolicy,
    strategy: RebuildStrategy,
    page_size: i64,
}

impl UserProjection {
    pub fn new(
        store: Arc<dyn UserProfileStore>,
        events: Arc<dyn EventStore>,
        snapshots: Arc<dyn SnapshotStore>,
        cursors: Arc<dyn CursorStore>,
    ) -> Self {
        Self {
            store,
            events,
            snapshots,
            cursors,
            retry: RetryPolicy::default(),
            strategy: RebuildStrategy::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_strategy(mut self, strategy: RebuildStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn strategy(&self) -> RebuildStrategy {
        self.strategy
    }

    /// Event names this projection consumes
    pub fn event_names() -> Vec<String> {
        UserEvent::registry().names()
    }

    /// Insert a new row at version 1
    pub async fn save(&self, profile: &UserProfile) -> Result<(), ProjectionError> {
        let mut row = profile.clone();
        row.version = 1;
        self.store.insert(&row).await
    }

    /// Apply a patch that moves the row to `target_version`.
    ///
    /// A version mismatch is retried `max_retries` times with a fixed delay.
    /// Once retries run out the drift policy decides: `Tolerate` logs a
    /// warning and returns `Ok` with the row untouched, `Escalate` returns the
    /// mismatch. Other errors are returned immediately.
    pub async fn update(
        &self,
        id: Uuid,
        patch: &UserProfilePatch,
        target_version: i64,
    ) -> Result<(), ProjectionError> {
        let mut retries = 0;

        loop {
            match self.store.update_versioned(id, patch, target_version).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_version_mismatch() => {
                    if retries >= self.retry.max_retries {
                        return match self.retry.drift {
                            DriftPolicy::Tolerate => {
                                tracing::warn!(
                                    projection = PROJECTION_NAME,
                                    id = %id,
                                    target_version,
                                    retries,
                                    error = %e,
                                    "Projection drift tolerated"
                                );
                                Ok(())
                            }
                            DriftPolicy::Escalate => Err(e),
                        };
                    }

                    retries += 1;
                    tracing::debug!(
                        projection = PROJECTION_NAME,
                        id = %id,
                        target_version,
                        attempt = retries,
                        "Version mismatch, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Active rows, 1-based pages ordered by id
    pub async fn get_all(
        &self,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<UserProfile>, ProjectionError> {
        let page_size = page_size.max(1);
        let offset = (page.max(1) - 1) * page_size;
        self.store.list(offset, page_size, false).await
    }

    /// Active row by id; missing and soft-deleted rows are `NotFound`
    pub async fn get_by_id(&self, id: Uuid) -> Result<UserProfile, ProjectionError> {
        self.store
            .find(id)
            .await?
            .filter(|p| !p.is_deleted())
            .ok_or(ProjectionError::NotFound(id))
    }

    /// Project one stored event
    pub async fn handle(&self, recorded: &RecordedEvent) -> Result<(), ProjectionError> {
        let event: UserEvent = recorded.decode()?;

        if let UserEvent::Created(created) = &event {
            return self.save(&UserProfile::created(created)).await;
        }

        match UserProfilePatch::from_event(&event) {
            Some(patch) => {
                self.update(recorded.aggregate_id, &patch, recorded.aggregate_version)
                    .await
            }
            None => Ok(()),
        }
    }

    /// Rebuild with the configured strategy
    pub async fn rebuild(&self) -> Result<RebuildReport, ProjectionError> {
        match self.strategy {
            RebuildStrategy::Incremental => self.catch_up().await,
            RebuildStrategy::FullCopy => self.full_copy().await,
        }
    }

    /// Clear the table and the cursor, then replay the whole log
    pub async fn rebuild_from_scratch(&self) -> Result<RebuildReport, ProjectionError> {
        let deleted = self.store.delete_all().await?;
        self.cursors.reset(PROJECTION_NAME).await?;
        tracing::info!(projection = PROJECTION_NAME, deleted, "Projection reset");

        self.catch_up().await
    }

    /// Apply every event after the stored cursor, then store the new cursor.
    ///
    /// Unknown `(name, schema_version)` pairs abort the pass; the cursor keeps
    /// its previous value.
    pub async fn catch_up(&self) -> Result<RebuildReport, ProjectionError> {
        let names = Self::event_names();
        let start = self
            .cursors
            .load(PROJECTION_NAME)
            .await?
            .map(|c| c.last_sequence)
            .unwrap_or(0);

        let mut report = RebuildReport {
            last_sequence: start,
            ..RebuildReport::default()
        };

        loop {
            let page = self
                .events
                .load_by_name(&names, report.last_sequence, self.page_size)
                .await?;
            if page.is_empty() {
                break;
            }

            for recorded in &page {
                self.apply_recorded(recorded, &mut report).await?;
                report.last_sequence = recorded.sequence;
            }
        }

        self.cursors
            .save(PROJECTION_NAME, report.last_sequence)
            .await?;

        tracing::info!(
            projection = PROJECTION_NAME,
            from_sequence = start,
            to_sequence = report.last_sequence,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            drifted = report.drifted,
            "Projection caught up"
        );

        Ok(report)
    }

    async fn apply_recorded(
        &self,
        recorded: &RecordedEvent,
        report: &mut RebuildReport,
    ) -> Result<(), ProjectionError> {
        let event: UserEvent = match recorded.decode() {
            Ok(event) => event,
            Err(e @ DomainError::MalformedEvent { .. }) => {
                tracing::warn!(
                    projection = PROJECTION_NAME,
                    sequence = recorded.sequence,
                    error = %e,
                    "Skipping event with malformed payload"
                );
                report.skipped += 1;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let id = recorded.aggregate_id;
        match self.store.find(id).await? {
            Some(row) if row.version >= recorded.aggregate_version => {
                report.already_applied += 1;
            }
            Some(row) => {
                let Some(patch) = UserProfilePatch::from_event(&event) else {
                    // Creation below an existing row's version cannot be applied
                    report.drifted += 1;
                    return Ok(());
                };

                match self
                    .store
                    .update_versioned(id, &patch, recorded.aggregate_version)
                    .await
                {
                    Ok(_) => report.updated += 1,
                    Err(e) if e.is_version_mismatch() => {
                        tracing::warn!(
                            projection = PROJECTION_NAME,
                            id = %id,
                            current_version = row.version,
                            event_version = recorded.aggregate_version,
                            "Projection row out of step with the log"
                        );
                        report.drifted += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
            None => match &event {
                UserEvent::Created(created) => {
                    self.store.insert(&UserProfile::created(created)).await?;
                    report.created += 1;
                }
                _ => {
                    tracing::warn!(
                        projection = PROJECTION_NAME,
                        id = %id,
                        sequence = recorded.sequence,
                        event = %recorded.name,
                        "Skipping event for missing row"
                    );
                    report.skipped += 1;
                }
            },
        }

        Ok(())
    }

    /// Delete every row and rewrite it from the latest snapshots plus the
    /// events logged after them.
    ///
    /// Aggregates with no snapshot yet are then folded from their first
    /// event, so every aggregate in the log gets its row back.
    pub async fn full_copy(&self) -> Result<RebuildReport, ProjectionError> {
        let deleted = self.store.delete_all().await?;
        let mut report = RebuildReport::default();
        let mut copied = HashSet::new();
        let mut offset = 0;

        loop {
            let page = self
                .snapshots
                .list_latest(User::aggregate_type(), offset, self.page_size)
                .await?;
            if page.is_empty() {
                break;
            }

            for snapshot in &page {
                let seed: User = snapshot.restore()?;
                self.copy_aggregate(snapshot.aggregate_id, seed, &mut report)
                    .await?;
                copied.insert(snapshot.aggregate_id);
            }

            offset += page.len() as i64;
        }

        let from_snapshots = report.created;
        offset = 0;

        loop {
            let ids = self
                .events
                .list_aggregate_ids(User::aggregate_type(), offset, self.page_size)
                .await?;
            if ids.is_empty() {
                break;
            }

            for id in &ids {
                if !copied.contains(id) {
                    self.copy_aggregate(*id, User::default(), &mut report).await?;
                }
            }

            offset += ids.len() as i64;
        }

        tracing::info!(
            projection = PROJECTION_NAME,
            deleted,
            created = report.created,
            from_snapshots,
            "Projection copied from snapshots and log"
        );

        Ok(report)
    }

    async fn copy_aggregate(
        &self,
        id: Uuid,
        seed: User,
        report: &mut RebuildReport,
    ) -> Result<(), ProjectionError> {
        let tail = self.events.load_tail(id, seed.version()).await?;
        let user = AggregateRepository::<User>::replay(seed, &tail)?;

        if let Some(last) = tail.last() {
            report.last_sequence = report.last_sequence.max(last.sequence);
        }

        match UserProfile::from_aggregate(&user) {
            Some(row) => {
                self.store.insert(&row).await?;
                report.created += 1;
            }
            None => report.skipped += 1,
        }

        Ok(())
    }
}

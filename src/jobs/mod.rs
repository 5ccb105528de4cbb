//! Scheduled Jobs
//!
//! Background job that keeps the user profile projection caught up with the
//! event log between per-event updates.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::projection::{ProjectionError, RebuildReport, UserProjection};

/// Result of one catch-up pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchUpReport {
    pub rebuild: RebuildReport,
    pub completed_at: DateTime<Utc>,
}

/// Periodic projection catch-up
#[derive(Clone)]
pub struct ProjectionCatchUpJob {
    projection: UserProjection,
    interval: Duration,
}

impl ProjectionCatchUpJob {
    pub fn new(projection: UserProjection, interval: Duration) -> Self {
        Self {
            projection,
            interval,
        }
    }

    /// Run one rebuild pass with the projection's configured strategy
    pub async fn run_once(&self) -> Result<CatchUpReport, JobError> {
        let rebuild = self.projection.rebuild().await?;

        if rebuild.drifted > 0 || rebuild.skipped > 0 {
            tracing::warn!(
                drifted = rebuild.drifted,
                skipped = rebuild.skipped,
                "Catch-up finished with unapplied events"
            );
        }

        Ok(CatchUpReport {
            rebuild,
            completed_at: Utc::now(),
        })
    }

    /// Start the job in the background.
    ///
    /// The loop exits when `shutdown` flips to `true` or its sender is dropped.
    pub fn start(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown).await;
        })
    }

    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Projection catch-up job started");

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "Projection catch-up failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Projection catch-up job stopped");
    }
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::aggregate::{AggregateCache, AggregateRepository, User};
    use crate::event_store::InMemoryEventStore;
    use crate::projection::{InMemoryCursorStore, InMemoryUserProfileStore};

    fn job(store: &InMemoryEventStore, profiles: &InMemoryUserProfileStore) -> ProjectionCatchUpJob {
        let projection = UserProjection::new(
            Arc::new(profiles.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(InMemoryCursorStore::new()),
        );
        ProjectionCatchUpJob::new(projection, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_run_once_projects_new_users() {
        let store = InMemoryEventStore::new();
        let profiles = InMemoryUserProfileStore::new();
        let repo = AggregateRepository::<User>::with_store(store.clone(), AggregateCache::new());

        let mut user = User::default();
        let events = user
            .register(Uuid::new_v4(), "alice".to_string(), "a@example.com".to_string(), None)
            .unwrap();
        repo.save(&mut user, events).await.unwrap();

        let job = job(&store, &profiles);
        let first = job.run_once().await.unwrap();
        let second = job.run_once().await.unwrap();

        assert_eq!(first.rebuild.created, 1);
        assert_eq!(second.rebuild.applied(), 0);
        assert_eq!(second.rebuild.last_sequence, first.rebuild.last_sequence);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_stops_on_shutdown() {
        let store = InMemoryEventStore::new();
        let profiles = InMemoryUserProfileStore::new();
        let (tx, rx) = watch::channel(false);

        let handle = job(&store, &profiles).start(rx);
        tokio::time::sleep(Duration::from_secs(65)).await;
        tx.send(true).unwrap();

        handle.await.unwrap();
    }
}

//! Aggregate module
//!
//! Aggregate Root pattern for Event Sourcing: the capability trait every
//! aggregate implements, the process-local cache, and the repository that
//! builds and saves aggregates.

pub mod cache;
pub mod repository;
pub mod user;

use std::fmt;

use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::domain::DomainEvent;
use crate::snapshot::SnapshotCadence;

pub use cache::AggregateCache;
pub use repository::{AggregateRepository, RepositoryError};
pub use user::{User, UserStatus};

/// Aggregate trait that all aggregates must implement
///
/// The nil UUID is the id of an empty aggregate. Empty aggregates are valid
/// in memory but cannot be persisted.
pub trait Aggregate:
    Default + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The type of events this aggregate handles
    type Event: DomainEvent;

    /// Snapshot cadence for this aggregate type
    const SNAPSHOT_CADENCE: SnapshotCadence = SnapshotCadence::LOW_CHURN;

    /// Get the aggregate type name (for storage)
    fn aggregate_type() -> &'static str;

    /// Get the aggregate ID
    fn id(&self) -> Uuid;

    /// Get the current version (number of events applied)
    fn version(&self) -> i64;

    /// Set the version after replay or persistence
    fn set_version(&mut self, version: i64);

    /// Mutate fields for an event. Never changes the version or emits events.
    fn apply(&mut self, event: &Self::Event);

    /// True when the aggregate has no id
    fn is_empty(&self) -> bool {
        self.id().is_nil()
    }
}

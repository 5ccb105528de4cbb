//! eventkeep Library
//!
//! Event-sourced persistence: an append-only event log with optimistic
//! concurrency, snapshots, an aggregate repository with a process-local
//! cache, and versioned read-model projections.

pub mod aggregate;
pub mod config;
pub mod db;
pub mod domain;
mod error;
pub mod event_store;
pub mod handlers;
pub mod jobs;
pub mod projection;
pub mod snapshot;

pub use aggregate::{Aggregate, AggregateCache, AggregateRepository, RepositoryError, User};
pub use config::{Config, ConfigError};
pub use domain::{DomainError, DomainEvent, EventRegistry, UserEvent};
pub use error::{AppError, AppResult};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, PgEventStore};
pub use snapshot::{Snapshot, SnapshotCadence, SnapshotPolicy, SnapshotStore};

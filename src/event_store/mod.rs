//! Event Store module
//!
//! Append-only event log with optimistic concurrency on
//! `(aggregate_id, aggregate_version)`. Backed by PostgreSQL in production
//! and by an in-process store for tests and embedding.

mod error;
mod memory;
mod postgres;
mod store;

pub use error::EventStoreError;
pub use memory::{InMemoryEventStore, StoreStats};
pub use postgres::PgEventStore;
pub use store::{EventStore, NewEvent, RecordedEvent, DEFAULT_PAGE_SIZE};

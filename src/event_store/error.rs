//! Event Store Errors
//!
//! Error types for event and snapshot store operations.

use uuid::Uuid;

/// Errors that can occur in the event store
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// Append called without an aggregate id
    #[error("Cannot append events without an aggregate id")]
    EmptyAggregateId,

    /// Optimistic concurrency conflict: the version is already taken
    #[error("Concurrency conflict for aggregate {aggregate_id}: version {version} already exists")]
    ConcurrencyConflict { aggregate_id: Uuid, version: i64 },

    /// The batch does not describe a valid extension of one aggregate
    #[error("Invalid event batch: {0}")]
    InvalidBatch(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl EventStoreError {
    /// Check if this error is a concurrency conflict
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, EventStoreError::ConcurrencyConflict { .. })
    }

    /// Check if this error is retryable by re-reading and re-running the command
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EventStoreError::ConcurrencyConflict { .. } | EventStoreError::Database(_)
        )
    }
}

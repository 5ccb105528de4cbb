//! Projection Errors

use uuid::Uuid;

use crate::domain::DomainError;
use crate::event_store::EventStoreError;

/// Projection errors
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// The record is not at `target_version - 1`
    #[error("Version mismatch for record {id}: target version {target}, current version {current}")]
    VersionMismatch { id: Uuid, target: i64, current: i64 },

    #[error("Record not found: {0}")]
    NotFound(Uuid),

    #[error("Record already exists: {0}")]
    AlreadyExists(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ProjectionError {
    pub fn is_version_mismatch(&self) -> bool {
        matches!(self, ProjectionError::VersionMismatch { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProjectionError::NotFound(_))
    }
}

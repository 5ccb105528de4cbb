//! Error handling module
//!
//! Crate-level error type wrapping every module error, with stable
//! machine-readable codes.

use crate::aggregate::RepositoryError;
use crate::config::ConfigError;
use crate::domain::DomainError;
use crate::event_store::EventStoreError;
use crate::projection::ProjectionError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("User not found: {0}")]
    UserNotFound(uuid::Uuid),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AppError {
    /// Stable code for logs and callers
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::UserNotFound(_) => "user_not_found",
            AppError::Domain(e) => domain_code(e),
            AppError::EventStore(e) => store_code(e),
            AppError::Repository(RepositoryError::Domain(e)) => domain_code(e),
            AppError::Repository(RepositoryError::Store(e)) => store_code(e),
            AppError::Projection(e) => match e {
                ProjectionError::VersionMismatch { .. } => "version_mismatch",
                ProjectionError::NotFound(_) => "record_not_found",
                ProjectionError::AlreadyExists(_) => "record_exists",
                ProjectionError::Database(_) => "database_error",
                ProjectionError::EventStore(e) => store_code(e),
                ProjectionError::Domain(e) => domain_code(e),
            },
            AppError::Config(_) => "config_error",
        }
    }

    /// Errors caused by the caller rather than the system
    pub fn is_client_error(&self) -> bool {
        match self {
            AppError::UserNotFound(_) => true,
            AppError::Domain(e) | AppError::Repository(RepositoryError::Domain(e)) => {
                e.is_client_error()
            }
            AppError::Repository(e) => e.is_concurrency_conflict(),
            AppError::EventStore(e) => e.is_concurrency_conflict(),
            AppError::Projection(e) => e.is_not_found(),
            _ => false,
        }
    }
}

fn domain_code(e: &DomainError) -> &'static str {
    match e {
        DomainError::Validation(_) => "validation_error",
        DomainError::EmptyAggregate => "empty_aggregate",
        DomainError::UnprocessableEvent { .. } => "unprocessable_event",
        DomainError::MalformedEvent { .. } => "malformed_event",
        DomainError::StateSerialization(_) => "serialization_error",
    }
}

fn store_code(e: &EventStoreError) -> &'static str {
    match e {
        EventStoreError::EmptyAggregateId => "empty_aggregate",
        EventStoreError::ConcurrencyConflict { .. } => "concurrency_conflict",
        EventStoreError::InvalidBatch(_) => "invalid_batch",
        EventStoreError::Database(_) => "database_error",
    }
}

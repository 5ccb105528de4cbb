//! Domain Error Types
//!
//! Errors raised by aggregates and by event decoding. They are independent
//! of the storage layer.

use thiserror::Error;

/// Domain-level errors
///
/// Business rule violations, caller-contract violations on aggregates, and
/// failures to interpret a stored event.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Business rule violated inside an aggregate operation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Attempt to persist an aggregate that has no id
    #[error("Cannot persist an empty aggregate (no id)")]
    EmptyAggregate,

    /// No decoder is registered for this (name, schema version) pair
    #[error("Unprocessable event: {name} (schema version {schema_version})")]
    UnprocessableEvent { name: String, schema_version: i32 },

    /// A decoder exists but the payload does not match it
    #[error("Malformed payload for event {name} (schema version {schema_version}): {source}")]
    MalformedEvent {
        name: String,
        schema_version: i32,
        #[source]
        source: serde_json::Error,
    },

    /// Aggregate state could not be (de)serialized
    #[error("State serialization error: {0}")]
    StateSerialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Check if this is a client error (caller's fault, surfaced unchanged)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if the error means a stored event could not be interpreted
    pub fn is_unprocessable(&self) -> bool {
        matches!(
            self,
            Self::UnprocessableEvent { .. } | Self::MalformedEvent { .. }
        )
    }
}

//! Event Registry
//!
//! Maps a stored event's `(name, schema_version)` tag to the decoder that
//! turns its payload back into a typed domain event. Names are explicit,
//! stable strings chosen by each event type; they never come from Rust
//! type names.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use super::DomainError;

/// Decoder for one `(name, schema_version)` pair
pub type Decoder<E> = fn(serde_json::Value) -> Result<E, serde_json::Error>;

/// A domain event that can be stored in and replayed from the event log
pub trait DomainEvent: Serialize + Clone + Send + Sync + Sized + 'static {
    /// Stable name stored alongside the payload
    fn name(&self) -> &'static str;

    /// Schema version written for new events of this kind
    fn schema_version(&self) -> i32;

    /// Decoders for every known `(name, schema_version)` pair
    fn registry() -> &'static EventRegistry<Self>;

    /// Serialize the payload (without the name tag)
    fn payload(&self) -> Result<serde_json::Value, DomainError>;
}

/// Explicit decoder table keyed by `(name, schema_version)`
pub struct EventRegistry<E> {
    decoders: HashMap<(String, i32), Decoder<E>>,
}

impl<E> EventRegistry<E> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register a decoder for a `(name, schema_version)` pair
    pub fn register(mut self, name: &str, schema_version: i32, decoder: Decoder<E>) -> Self {
        self.decoders
            .insert((name.to_string(), schema_version), decoder);
        self
    }

    /// Check whether a pair is known
    pub fn contains(&self, name: &str, schema_version: i32) -> bool {
        self.decoders
            .contains_key(&(name.to_string(), schema_version))
    }

    /// Decode a payload.
    ///
    /// An unknown pair is [`DomainError::UnprocessableEvent`]; a known pair
    /// whose payload does not fit is [`DomainError::MalformedEvent`].
    pub fn decode(
        &self,
        name: &str,
        schema_version: i32,
        payload: &serde_json::Value,
    ) -> Result<E, DomainError> {
        let decoder = self
            .decoders
            .get(&(name.to_string(), schema_version))
            .ok_or_else(|| DomainError::UnprocessableEvent {
                name: name.to_string(),
                schema_version,
            })?;

        decoder(payload.clone()).map_err(|source| DomainError::MalformedEvent {
            name: name.to_string(),
            schema_version,
            source,
        })
    }

    /// Distinct event names known to this registry, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.decoders.keys().map(|(n, _)| n.clone()).collect();
        names.sort();
        names.dedup();
        names
    }
}

impl<E> Default for EventRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.decoders.keys().collect();
        keys.sort();
        f.debug_struct("EventRegistry").field("decoders", &keys).finish()
    }
}

//! Domain module
//!
//! Core domain types: events, the event registry, and domain errors.

pub mod error;
pub mod events;
pub mod registry;

pub use error::DomainError;
pub use events::{
    UserChanges, UserCreated, UserDeactivated, UserEvent, UserReactivated, UserUpdated,
};
pub use registry::{Decoder, DomainEvent, EventRegistry};

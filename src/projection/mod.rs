//! Projection module
//!
//! Read models derived from the event log. Each projection row carries the
//! source aggregate's version so updates can be applied exactly in order.

mod error;
mod policy;
mod postgres;
mod record;
mod store;
mod user_profiles;

pub use error::ProjectionError;
pub use policy::{DriftPolicy, RebuildStrategy, RetryPolicy};
pub use postgres::{PgCursorStore, PgUserProfileStore};
pub use record::{UserProfile, UserProfilePatch};
pub use store::{
    CursorStore, InMemoryCursorStore, InMemoryUserProfileStore, ProjectionCursor,
    UserProfileStore,
};
pub use user_profiles::{RebuildReport, UserProjection, PROJECTION_NAME};

//! Command Handlers module
//!
//! Each handler builds the aggregate, runs one business method, saves the
//! resulting events and feeds them to the read model.

mod commands;
mod deactivate_user_handler;
mod update_user_handler;
mod user_handler;

pub use commands::*;
pub use deactivate_user_handler::{DeactivateUserHandler, ReactivateUserHandler};
pub use update_user_handler::UpdateUserHandler;
pub use user_handler::RegisterUserHandler;

use chrono::Utc;

use crate::aggregate::{Aggregate, User};
use crate::event_store::RecordedEvent;
use crate::projection::UserProjection;

/// Feed freshly saved events to the projection.
///
/// The events are already durable; a projection failure is logged and left
/// for the catch-up job.
async fn project(projection: Option<&UserProjection>, recorded: &[RecordedEvent]) {
    let Some(projection) = projection else {
        return;
    };

    for event in recorded {
        if let Err(e) = projection.handle(event).await {
            tracing::warn!(
                aggregate_id = %event.aggregate_id,
                version = event.aggregate_version,
                error = %e,
                "Projection update failed"
            );
            return;
        }
    }
}

fn acknowledge(user: &User) -> UserCommandResult {
    UserCommandResult {
        user_id: user.id(),
        version: user.version(),
        occurred_at: user.updated_at().unwrap_or_else(Utc::now),
    }
}

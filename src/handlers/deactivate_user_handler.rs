//! Deactivate / Reactivate User Handlers
//!
//! Deactivation is a soft delete: the user keeps its history and the read
//! model hides the row until reactivation.

use crate::aggregate::{Aggregate, AggregateRepository, User};
use crate::error::AppError;
use crate::projection::UserProjection;

use super::{
    acknowledge, project, DeactivateUserCommand, ReactivateUserCommand, UserCommandResult,
};

/// Handler for user deactivation
#[derive(Clone)]
pub struct DeactivateUserHandler {
    repository: AggregateRepository<User>,
    projection: Option<UserProjection>,
}

impl DeactivateUserHandler {
    pub fn new(repository: AggregateRepository<User>) -> Self {
        Self {
            repository,
            projection: None,
        }
    }

    pub fn with_projection(mut self, projection: UserProjection) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Execute the deactivate user command
    pub async fn execute(
        &self,
        command: DeactivateUserCommand,
    ) -> Result<UserCommandResult, AppError> {
        let mut user = self.repository.build(command.user_id).await?;
        if user.is_empty() {
            return Err(AppError::UserNotFound(command.user_id));
        }

        let events = user.deactivate(command.reason)?;
        let recorded = self.repository.save(&mut user, events).await?;

        project(self.projection.as_ref(), &recorded).await;

        tracing::info!(user_id = %command.user_id, "User deactivated");
        Ok(acknowledge(&user))
    }
}

/// Handler for user reactivation
#[derive(Clone)]
pub struct ReactivateUserHandler {
    repository: AggregateRepository<User>,
    projection: Option<UserProjection>,
}

impl ReactivateUserHandler {
    pub fn new(repository: AggregateRepository<User>) -> Self {
        Self {
            repository,
            projection: None,
        }
    }

    pub fn with_projection(mut self, projection: UserProjection) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Execute the reactivate user command
    pub async fn execute(
        &self,
        command: ReactivateUserCommand,
    ) -> Result<UserCommandResult, AppError> {
        let mut user = self.repository.build(command.user_id).await?;
        if user.is_empty() {
            return Err(AppError::UserNotFound(command.user_id));
        }

        let events = user.reactivate()?;
        let recorded = self.repository.save(&mut user, events).await?;

        project(self.projection.as_ref(), &recorded).await;

        tracing::info!(user_id = %command.user_id, "User reactivated");
        Ok(acknowledge(&user))
    }
}

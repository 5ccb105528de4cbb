//! Update User Handler

use crate::aggregate::{Aggregate, AggregateRepository, User};
use crate::error::AppError;
use crate::projection::UserProjection;

use super::{acknowledge, project, UpdateUserCommand, UserCommandResult};

/// Handler for user profile updates
#[derive(Clone)]
pub struct UpdateUserHandler {
    repository: AggregateRepository<User>,
    projection: Option<UserProjection>,
}

impl UpdateUserHandler {
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

    /// Execute the update user command
    pub async fn execute(&self, command: UpdateUserCommand) -> Result<UserCommandResult, AppError> {
        let mut user = self.repository.build(command.user_id).await?;
        if user.is_empty() {
            return Err(AppError::UserNotFound(command.user_id));
        }

        let events = user.update(command.changes)?;
        let recorded = self.repository.save(&mut user, events).await?;

        project(self.projection.as_ref(), &recorded).await;

        Ok(acknowledge(&user))
    }
}

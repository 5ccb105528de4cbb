//! User Registration Handler

use crate::aggregate::{AggregateRepository, User};
use crate::error::AppError;
use crate::projection::UserProjection;

use super::{acknowledge, project, RegisterUserCommand, UserCommandResult};

/// Handler for user registration
#[derive(Clone)]
pub struct RegisterUserHandler {
    repository: AggregateRepository<User>,
    projection: Option<UserProjection>,
}

impl RegisterUserHandler {
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

    /// Execute the register user command
    pub async fn execute(&self, command: RegisterUserCommand) -> Result<UserCommandResult, AppError> {
        // Existing history makes `register` fail validation
        let mut user = self.repository.build(command.user_id).await?;

        let events = user.register(
            command.user_id,
            command.username,
            command.email,
            command.display_name,
        )?;
        let recorded = self.repository.save(&mut user, events).await?;

        project(self.projection.as_ref(), &recorded).await;

        tracing::info!(user_id = %command.user_id, "User registered");
        Ok(acknowledge(&user))
    }
}

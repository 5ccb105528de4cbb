//! Command definitions
//!
//! Commands represent intentions to change the system state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::UserChanges;

/// Command to register a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserCommand {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl RegisterUserCommand {
    pub fn new(user_id: Uuid, username: String, email: String) -> Self {
        Self {
            user_id,
            username,
            email,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: String) -> Self {
        self.display_name = Some(display_name);
        self
    }
}

/// Command to update a user's profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserCommand {
    pub user_id: Uuid,
    pub changes: UserChanges,
}

impl UpdateUserCommand {
    pub fn new(user_id: Uuid, changes: UserChanges) -> Self {
        Self { user_id, changes }
    }
}

/// Command to deactivate a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeactivateUserCommand {
    pub user_id: Uuid,
    pub reason: Option<String>,
}

impl DeactivateUserCommand {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: String) -> Self {
        self.reason = Some(reason);
        self
    }
}

/// Command to reactivate a deactivated user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactivateUserCommand {
    pub user_id: Uuid,
}

impl ReactivateUserCommand {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

/// Acknowledgement of a persisted user command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCommandResult {
    pub user_id: Uuid,
    /// Aggregate version after the command
    pub version: i64,
    pub occurred_at: DateTime<Utc>,
}

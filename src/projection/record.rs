//! User profile read model
//!
//! Denormalized row in `user_profiles` and the partial update applied to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{Aggregate, User, UserStatus};
use crate::domain::{UserCreated, UserEvent};

/// One row of the user profile projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub status: UserStatus,
    /// Source aggregate version of the last applied event
    pub version: i64,
    /// Soft-delete marker, set while the user is deactivated
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Row for a newly created user (version 1)
    pub fn created(event: &UserCreated) -> Self {
        Self {
            id: event.user_id,
            username: event.username.clone(),
            email: event.email.clone(),
            display_name: event.display_name.clone(),
            status: UserStatus::Active,
            version: 1,
            deleted_at: None,
            created_at: event.created_at,
            updated_at: event.created_at,
        }
    }

    /// Row reflecting a fully built aggregate; `None` for an empty one
    pub fn from_aggregate(user: &User) -> Option<Self> {
        if user.is_empty() {
            return None;
        }

        let updated_at = user.updated_at()?;
        Some(Self {
            id: user.id(),
            username: user.username().to_string(),
            email: user.email().to_string(),
            display_name: user.display_name().map(str::to_string),
            status: user.status(),
            version: user.version(),
            // Deactivation is the last change a deactivated user can receive
            deleted_at: (user.status() == UserStatus::Deactivated).then_some(updated_at),
            created_at: user.created_at().unwrap_or(updated_at),
            updated_at,
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Partial update merged into a [`UserProfile`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfilePatch {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub status: Option<UserStatus>,
    /// `Some(None)` clears the soft-delete marker
    pub deleted_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfilePatch {
    /// Patch for a non-creation event; `None` for `UserCreated`
    pub fn from_event(event: &UserEvent) -> Option<Self> {
        match event {
            UserEvent::Created(_) => None,
            UserEvent::Updated(e) => Some(Self {
                email: e.changes.email.clone(),
                display_name: e.changes.display_name.clone(),
                updated_at: Some(e.updated_at),
                ..Self::default()
            }),
            UserEvent::Deactivated(e) => Some(Self {
                status: Some(UserStatus::Deactivated),
                deleted_at: Some(Some(e.deactivated_at)),
                updated_at: Some(e.deactivated_at),
                ..Self::default()
            }),
            UserEvent::Reactivated(e) => Some(Self {
                status: Some(UserStatus::Active),
                deleted_at: Some(None),
                updated_at: Some(e.reactivated_at),
                ..Self::default()
            }),
        }
    }

    /// Merge into `profile` and move it to `version`
    pub fn apply_to(&self, profile: &mut UserProfile, version: i64) {
        if let Some(email) = &self.email {
            profile.email = email.clone();
        }
        if let Some(display_name) = &self.display_name {
            profile.display_name = Some(display_name.clone());
        }
        if let Some(status) = self.status {
            profile.status = status;
        }
        if let Some(deleted_at) = self.deleted_at {
            profile.deleted_at = deleted_at;
        }
        if let Some(updated_at) = self.updated_at {
            profile.updated_at = updated_at;
        }
        profile.version = version;
    }
}

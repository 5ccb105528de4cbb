//! User Aggregate
//!
//! User aggregate for managing user profile information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    DomainError, UserChanges, UserCreated, UserDeactivated, UserEvent, UserReactivated,
    UserUpdated,
};
use crate::snapshot::SnapshotCadence;

use super::Aggregate;

/// User status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    Deactivated,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Deactivated => "deactivated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(UserStatus::Active),
            "deactivated" => Some(UserStatus::Deactivated),
            _ => None,
        }
    }
}

/// User Aggregate
///
/// Business methods validate, mutate fields, and return the new events.
/// The repository assigns versions when it saves them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID (nil when empty)
    id: Uuid,

    /// Username (unique)
    username: String,

    /// Email
    email: String,

    /// Display name
    display_name: Option<String>,

    /// User status
    status: UserStatus,

    /// Current version
    version: i64,

    /// When the user was created
    created_at: Option<DateTime<Utc>>,

    /// When the user was last updated
    updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Register a new user on an empty aggregate
    pub fn register(
        &mut self,
        user_id: Uuid,
        username: String,
        email: String,
        display_name: Option<String>,
    ) -> Result<Vec<UserEvent>, DomainError> {
        if !self.is_empty() {
            return Err(DomainError::validation(format!(
                "User {} already exists",
                self.id
            )));
        }
        if user_id.is_nil() {
            return Err(DomainError::validation("User id must not be nil"));
        }
        if username.trim().is_empty() {
            return Err(DomainError::validation("Username must not be empty"));
        }

        let event = UserEvent::Created(UserCreated {
            user_id,
            username,
            email,
            display_name,
            created_at: Utc::now(),
        });

        self.apply(&event);
        Ok(vec![event])
    }

    /// Update user profile
    pub fn update(&mut self, changes: UserChanges) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_active()?;

        if changes.is_empty() {
            return Err(DomainError::validation("No changes provided"));
        }

        let event = UserEvent::Updated(UserUpdated {
            user_id: self.id,
            changes,
            updated_at: Utc::now(),
        });

        self.apply(&event);
        Ok(vec![event])
    }

    /// Deactivate the user (soft delete)
    pub fn deactivate(&mut self, reason: Option<String>) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_active()?;

        let event = UserEvent::Deactivated(UserDeactivated {
            user_id: self.id,
            reason,
            deactivated_at: Utc::now(),
        });

        self.apply(&event);
        Ok(vec![event])
    }

    /// Reactivate the user
    pub fn reactivate(&mut self) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists()?;
        if self.status != UserStatus::Deactivated {
            return Err(DomainError::validation("User is not deactivated"));
        }

        let event = UserEvent::Reactivated(UserReactivated {
            user_id: self.id,
            reactivated_at: Utc::now(),
        });

        self.apply(&event);
        Ok(vec![event])
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if self.is_empty() {
            return Err(DomainError::validation("User does not exist"));
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        self.ensure_exists()?;
        if self.status == UserStatus::Deactivated {
            return Err(DomainError::validation("User is deactivated"));
        }
        Ok(())
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn status(&self) -> UserStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

impl Aggregate for User {
    type Event = UserEvent;

    const SNAPSHOT_CADENCE: SnapshotCadence = SnapshotCadence::HIGH_CHURN;

    fn aggregate_type() -> &'static str {
        "User"
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::Created(e) => {
                self.id = e.user_id;
                self.username = e.username.clone();
                self.email = e.email.clone();
                self.display_name = e.display_name.clone();
                self.status = UserStatus::Active;
                self.created_at = Some(e.created_at);
                self.updated_at = Some(e.created_at);
            }

            UserEvent::Updated(e) => {
                if let Some(display_name) = &e.changes.display_name {
                    self.display_name = Some(display_name.clone());
                }
                if let Some(email) = &e.changes.email {
                    self.email = email.clone();
                }
                self.updated_at = Some(e.updated_at);
            }

            UserEvent::Deactivated(e) => {
                self.status = UserStatus::Deactivated;
                self.updated_at = Some(e.deactivated_at);
            }

            UserEvent::Reactivated(e) => {
                self.status = UserStatus::Active;
                self.updated_at = Some(e.reactivated_at);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(username: &str) -> User {
        let mut user = User::default();
        user.register(
            Uuid::new_v4(),
            username.to_string(),
            format!("{}@example.com", username),
            None,
        )
        .unwrap();
        user
    }

    #[test]
    fn test_user_register() {
        let user_id = Uuid::new_v4();
        let mut user = User::default();

        let events = user
            .register(
                user_id,
                "alice".to_string(),
                "alice@example.com".to_string(),
                Some("Alice Smith".to_string()),
            )
            .unwrap();

        assert_eq!(user.id(), user_id);
        assert_eq!(user.username(), "alice");
        assert_eq!(user.display_name(), Some("Alice Smith"));
        assert!(user.is_active());
        // Business methods leave the version to the repository
        assert_eq!(user.version(), 0);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], UserEvent::Created(_)));
    }

    #[test]
    fn test_register_twice_fails() {
        let mut user = registered("alice");
        let result = user.register(
            Uuid::new_v4(),
            "again".to_string(),
            "again@example.com".to_string(),
            None,
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_register_with_nil_id_fails() {
        let mut user = User::default();
        let result = user.register(Uuid::nil(), "x".to_string(), "x@example.com".to_string(), None);
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(user.is_empty());
    }

    #[test]
    fn test_user_update() {
        let mut user = registered("alice");

        let events = user
            .update(UserChanges {
                display_name: Some("Alice Wonder".to_string()),
                email: Some("alice.new@example.com".to_string()),
            })
            .unwrap();

        assert!(matches!(events[0], UserEvent::Updated(_)));
        assert_eq!(user.display_name(), Some("Alice Wonder"));
        assert_eq!(user.email(), "alice.new@example.com");
    }

    #[test]
    fn test_user_update_no_changes() {
        let mut user = registered("alice");
        let result = user.update(UserChanges::default());
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_update_on_empty_user_fails() {
        let mut user = User::default();
        let result = user.update(UserChanges {
            display_name: Some("Ghost".to_string()),
            email: None,
        });
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_user_deactivate_and_reactivate() {
        let mut user = registered("alice");

        user.deactivate(Some("User requested".to_string())).unwrap();
        assert_eq!(user.status(), UserStatus::Deactivated);

        user.reactivate().unwrap();
        assert!(user.is_active());
    }

    #[test]
    fn test_deactivated_user_cannot_update() {
        let mut user = registered("alice");
        user.deactivate(None).unwrap();

        let result = user.update(UserChanges {
            display_name: Some("New Name".to_string()),
            email: None,
        });
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_reactivate_active_user_fails() {
        let mut user = registered("alice");
        assert!(user.reactivate().is_err());
    }

    #[test]
    fn test_replaying_emitted_events_rebuilds_state() {
        let mut user = User::default();
        let mut history = user
            .register(Uuid::new_v4(), "alice".to_string(), "alice@example.com".to_string(), None)
            .unwrap();
        history.extend(
            user.update(UserChanges {
                display_name: Some("A".to_string()),
                email: None,
            })
            .unwrap(),
        );
        history.extend(user.deactivate(None).unwrap());

        let mut replayed = User::default();
        for event in &history {
            replayed.apply(event);
        }

        assert_eq!(replayed, user);
    }

    #[test]
    fn test_status_string_round_trip() {
        assert_eq!(UserStatus::parse(UserStatus::Active.as_str()), Some(UserStatus::Active));
        assert_eq!(
            UserStatus::parse(UserStatus::Deactivated.as_str()),
            Some(UserStatus::Deactivated)
        );
        assert_eq!(UserStatus::parse("banned"), None);
    }
}

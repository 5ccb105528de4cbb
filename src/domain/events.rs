//! Domain Events
//!
//! Event definitions for the user profile aggregate.
//! Events are immutable facts that have happened in the system.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::registry::{DomainEvent, EventRegistry};
use super::DomainError;

pub const USER_CREATED: &str = "UserCreated";
pub const USER_UPDATED: &str = "UserUpdated";
pub const USER_DEACTIVATED: &str = "UserDeactivated";
pub const USER_REACTIVATED: &str = "UserReactivated";

/// User was created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCreated {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// First schema of `UserCreated`, before display names existed
#[derive(Debug, Clone, Deserialize)]
struct UserCreatedV1 {
    user_id: Uuid,
    username: String,
    email: String,
    created_at: DateTime<Utc>,
}

impl From<UserCreatedV1> for UserCreated {
    fn from(v1: UserCreatedV1) -> Self {
        Self {
            user_id: v1.user_id,
            username: v1.username,
            email: v1.email,
            display_name: None,
            created_at: v1.created_at,
        }
    }
}

/// User profile was updated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUpdated {
    pub user_id: Uuid,
    pub changes: UserChanges,
    pub updated_at: DateTime<Utc>,
}

/// User was deactivated (soft delete)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDeactivated {
    pub user_id: Uuid,
    pub reason: Option<String>,
    pub deactivated_at: DateTime<Utc>,
}

/// User was reactivated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserReactivated {
    pub user_id: Uuid,
    pub reactivated_at: DateTime<Utc>,
}

/// Changes made to a user profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.email.is_none()
    }
}

/// User-related events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UserEvent {
    Created(UserCreated),
    Updated(UserUpdated),
    Deactivated(UserDeactivated),
    Reactivated(UserReactivated),
}

impl UserEvent {
    /// Get the user ID this event relates to
    pub fn user_id(&self) -> Uuid {
        match self {
            UserEvent::Created(e) => e.user_id,
            UserEvent::Updated(e) => e.user_id,
            UserEvent::Deactivated(e) => e.user_id,
            UserEvent::Reactivated(e) => e.user_id,
        }
    }
}

impl DomainEvent for UserEvent {
    fn name(&self) -> &'static str {
        match self {
            UserEvent::Created(_) => USER_CREATED,
            UserEvent::Updated(_) => USER_UPDATED,
            UserEvent::Deactivated(_) => USER_DEACTIVATED,
            UserEvent::Reactivated(_) => USER_REACTIVATED,
        }
    }

    fn schema_version(&self) -> i32 {
        match self {
            UserEvent::Created(_) => 2,
            _ => 1,
        }
    }

    fn registry() -> &'static EventRegistry<Self> {
        static REGISTRY: OnceLock<EventRegistry<UserEvent>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            EventRegistry::new()
                .register(USER_CREATED, 1, |v| {
                    serde_json::from_value::<UserCreatedV1>(v)
                        .map(|e| UserEvent::Created(e.into()))
                })
                .register(USER_CREATED, 2, |v| {
                    serde_json::from_value(v).map(UserEvent::Created)
                })
                .register(USER_UPDATED, 1, |v| {
                    serde_json::from_value(v).map(UserEvent::Updated)
                })
                .register(USER_DEACTIVATED, 1, |v| {
                    serde_json::from_value(v).map(UserEvent::Deactivated)
                })
                .register(USER_REACTIVATED, 1, |v| {
                    serde_json::from_value(v).map(UserEvent::Reactivated)
                })
        })
    }

    fn payload(&self) -> Result<serde_json::Value, DomainError> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_round_trips_through_registry() {
        let event = UserEvent::Updated(UserUpdated {
            user_id: Uuid::new_v4(),
            changes: UserChanges {
                display_name: Some("Alice".to_string()),
                email: None,
            },
            updated_at: Utc::now(),
        });

        let payload = event.payload().unwrap();
        assert!(payload.get("type").is_none());

        let decoded = UserEvent::registry()
            .decode(event.name(), event.schema_version(), &payload)
            .unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_user_created_v1_is_upcast() {
        let user_id = Uuid::new_v4();
        let payload = serde_json::json!({
            "user_id": user_id,
            "username": "alice",
            "email": "alice@example.com",
            "created_at": "2026-01-01T00:00:00Z"
        });

        let decoded = UserEvent::registry()
            .decode(USER_CREATED, 1, &payload)
            .unwrap();

        match decoded {
            UserEvent::Created(created) => {
                assert_eq!(created.user_id, user_id);
                assert_eq!(created.display_name, None);
            }
            other => panic!("Expected UserCreated, got: {:?}", other),
        }
    }

    #[test]
    fn test_new_user_created_is_written_at_schema_2() {
        let event = UserEvent::Created(UserCreated {
            user_id: Uuid::new_v4(),
            username: "bob".to_string(),
            email: "bob@example.com".to_string(),
            display_name: None,
            created_at: Utc::now(),
        });
        assert_eq!(event.name(), "UserCreated");
        assert_eq!(event.schema_version(), 2);
    }

    #[test]
    fn test_unknown_user_event_is_unprocessable() {
        let result = UserEvent::registry().decode("UserRenamed", 1, &serde_json::json!({}));
        assert!(matches!(result, Err(DomainError::UnprocessableEvent { .. })));
    }

    #[test]
    fn test_registry_names() {
        assert_eq!(
            UserEvent::registry().names(),
            vec![USER_CREATED, USER_DEACTIVATED, USER_REACTIVATED, USER_UPDATED]
        );
    }
}

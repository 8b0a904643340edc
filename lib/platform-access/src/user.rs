//! User records.
//!
//! A user is an interactive principal of one realm. It is matched to an
//! external identity through its bind ID (the identity's email, or its
//! subject when the provider has no email) after an OAuth2 login.

use crate::api_key::ApiKey;
use chrono::{DateTime, Utc};
use realmgate_authz::SystemRole;
use realmgate_core::{RealmId, UserId};
use serde::{Deserialize, Serialize};

/// An interactive principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub realm_id: RealmId,
    /// Stable identifier of the external identity bound to this user.
    pub bind_id: String,
    #[serde(default)]
    pub name: String,
    pub role: SystemRole,
    pub enabled: bool,
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates an enabled user with a fresh ID and no API keys.
    #[must_use]
    pub fn new(realm_id: RealmId, bind_id: impl Into<String>, role: SystemRole) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            realm_id,
            bind_id: bind_id.into(),
            name: String::new(),
            role,
            enabled: true,
            api_keys: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks the record as modified now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_is_enabled_without_keys() {
        let user = User::new(RealmId::new(), "alice@example.com", SystemRole::User);
        assert!(user.enabled);
        assert!(user.api_keys.is_empty());
        assert_eq!(user.created_at, user.updated_at);
        assert!(user.id.to_string().starts_with("usr_"));
    }

    #[test]
    fn touch_moves_updated_at() {
        let mut user = User::new(RealmId::new(), "alice@example.com", SystemRole::User);
        let before = user.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        user.touch();
        assert!(user.updated_at > before);
    }

    #[test]
    fn user_deserializes_without_optional_fields() {
        let json = format!(
            concat!(
                r#"{{"id":"{}","realm_id":"{}","bind_id":"bob@example.com","#,
                r#""role":"manager","enabled":true}}"#
            ),
            UserId::new(),
            RealmId::new()
        );
        let user: User = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(user.role, SystemRole::Manager);
        assert!(user.api_keys.is_empty());
    }
}

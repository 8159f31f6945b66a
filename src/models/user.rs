use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

/// Free-form user settings, stored as a JSON object.
pub type Preferences = Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub avatar: Option<String>,
    pub preferences: sqlx::types::Json<Preferences>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a user; the hash is computed by the caller.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub preferences: Preferences,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            avatar: u.avatar,
            preferences: u.preferences.0,
            created_at: u.created_at,
        }
    }
}

/// Lower-case and trim, so lookups and the unique constraint agree.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Shallow merge: keys in `update` replace keys in `current`.
pub fn merge_preferences(current: &mut Preferences, update: Preferences) {
    for (key, value) in update {
        current.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            avatar: None,
            preferences: sqlx::types::Json(Preferences::new()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "ada@example.com");
    }

    #[test]
    fn test_profile_is_camel_case() {
        let profile: UserProfile = sample().into();
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json["preferences"].is_object());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn test_merge_preferences_is_shallow() {
        let mut current = json!({ "theme": "light", "reminder": { "enabled": true } })
            .as_object()
            .cloned()
            .unwrap();
        let update = json!({ "reminder": { "time": "21:00" }, "weekStartsOn": "monday" })
            .as_object()
            .cloned()
            .unwrap();
        merge_preferences(&mut current, update);

        assert_eq!(current["theme"], "light");
        assert_eq!(current["reminder"], json!({ "time": "21:00" }));
        assert_eq!(current["weekStartsOn"], "monday");
    }
}

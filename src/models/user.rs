use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Display record embedded in response payloads wherever a user is
/// referenced. Resolved at read time from the user table, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRef {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl UserRef {
    /// Fallback for identifiers that no longer resolve to a user row.
    pub fn unknown(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: "Unknown User".to_string(),
            email: String::new(),
        }
    }
}

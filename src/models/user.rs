//! User account model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An account allowed to register projects and upload releases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Database ID (None if not yet persisted)
    pub id: Option<i64>,

    /// Login name
    pub username: String,

    /// Contact address
    pub email: String,

    /// Argon2id password hash (PHC format)
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Inactive users cannot upload
    pub is_active: bool,

    /// When the account was created
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new active user
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Mark the user as inactive
    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }
}

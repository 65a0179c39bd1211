use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>, full_name: impl Into<String>, role: Role) -> Self {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: password_hash.into(),
            full_name: full_name.into(),
            role,
            created_at: now,
            updated_at: now,
        }
    }
}

//! Database row types. These map directly to SQLite rows and stay distinct
//! from the forum-types API models to keep the DB layer independent.

use chrono::{DateTime, Utc};
use forum_types::models::User;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub provider: Option<String>,
    pub provider_id: Option<String>,
    pub provider_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            provider: row.provider,
            provider_id: row.provider_id,
            provider_email: row.provider_email,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub user_id: String,
    pub token: String,
    pub client_addr: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRow {
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

pub struct PostRow {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

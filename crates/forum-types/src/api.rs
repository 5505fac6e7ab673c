use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ReactionKind, ToggleAction, User};

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

// -- OAuth --

#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthLoginResponse {
    pub authorization_url: String,
    pub state: String,
}

/// Query parameters the provider appends to the redirect URL.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthCallbackResponse {
    pub user: User,
    pub session_token: String,
    pub is_new_user: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthStatusResponse {
    pub oauth_enabled: bool,
    pub providers: Vec<String>,
}

// -- Posts & comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateContentRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// -- Reactions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleReactionRequest {
    pub target_id: String,
    pub reaction: ReactionKind,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleReactionResponse {
    pub action: ToggleAction,
    pub like_count: u64,
    pub dislike_count: u64,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

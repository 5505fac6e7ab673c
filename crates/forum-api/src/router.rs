use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

use crate::auth::{self, AppState};
use crate::middleware::resolve_identity;
use crate::{oauth, posts, reactions};

/// All API routes. Every request first has its session cookie resolved;
/// protected handlers then demand an identity through `CurrentUser`.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/google/login", get(oauth::handlers::login))
        .route("/api/auth/google/callback", get(oauth::handlers::callback))
        .route("/api/auth/oauth/status", get(oauth::handlers::status))
        .route("/api/posts", post(posts::create_post))
        .route("/api/posts/{post_id}", delete(posts::delete_post))
        .route("/api/posts/{post_id}/comments", post(posts::create_comment))
        .route("/api/comments/{comment_id}", delete(posts::delete_comment))
        .route("/api/reactions/posts/toggle", post(reactions::toggle_post_reaction))
        .route("/api/reactions/comments/toggle", post(reactions::toggle_comment_reaction))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_identity))
        .with_state(state)
}

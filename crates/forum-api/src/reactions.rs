use axum::{Json, extract::State, response::IntoResponse};

use forum_types::api::{ToggleReactionRequest, ToggleReactionResponse};
use forum_types::models::TargetKind;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

pub async fn toggle_post_reaction(
    state: State<AppState>,
    user: CurrentUser,
    req: Json<ToggleReactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    toggle(state, user, TargetKind::Post, req).await
}

pub async fn toggle_comment_reaction(
    state: State<AppState>,
    user: CurrentUser,
    req: Json<ToggleReactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    toggle(state, user, TargetKind::Comment, req).await
}

async fn toggle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    kind: TargetKind,
    Json(req): Json<ToggleReactionRequest>,
) -> Result<Json<ToggleReactionResponse>, ApiError> {
    if req.target_id.trim().is_empty() {
        return Err(ApiError::Validation(format!("{kind} id is required")));
    }

    let outcome = tokio::task::spawn_blocking(move || {
        state
            .db
            .toggle_reaction(&user.id, kind, &req.target_id, req.reaction)
    })
    .await?
    .map_err(|e| match e {
        forum_db::DbError::NotFound => match kind {
            TargetKind::Post => ApiError::NotFound("post"),
            TargetKind::Comment => ApiError::NotFound("comment"),
        },
        other => other.into(),
    })?;

    Ok(Json(ToggleReactionResponse {
        action: outcome.action,
        like_count: outcome.counts.like_count,
        dislike_count: outcome.counts.dislike_count,
    }))
}

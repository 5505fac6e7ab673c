use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use forum_db::DbError;
use forum_types::api::{CommentResponse, CreateContentRequest, PostResponse};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

const POST_MIN_LEN: usize = 10;
const POST_MAX_LEN: usize = 500;
const COMMENT_MIN_LEN: usize = 5;
const COMMENT_MAX_LEN: usize = 150;

fn validate_content(content: &str, min: usize, max: usize, what: &str) -> Result<String, ApiError> {
    let content = content.trim();
    let len = content.chars().count();
    if len < min || len > max {
        return Err(ApiError::Validation(format!(
            "{what} must be between {min} and {max} characters"
        )));
    }
    Ok(content.to_string())
}

fn not_found_as(what: &'static str) -> impl Fn(DbError) -> ApiError {
    move |e| match e {
        DbError::NotFound => ApiError::NotFound(what),
        other => other.into(),
    }
}

pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = validate_content(&req.content, POST_MIN_LEN, POST_MAX_LEN, "post")?;

    let row = tokio::task::spawn_blocking(move || state.db.create_post(&user.id, &content))
        .await??;

    Ok((
        StatusCode::CREATED,
        Json(PostResponse {
            id: row.id,
            user_id: row.user_id,
            content: row.content,
            created_at: row.created_at,
        }),
    ))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    tokio::task::spawn_blocking(move || state.db.delete_post(&post_id, &user.id))
        .await?
        .map_err(not_found_as("post"))?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = validate_content(&req.content, COMMENT_MIN_LEN, COMMENT_MAX_LEN, "comment")?;

    let row = tokio::task::spawn_blocking(move || {
        state.db.create_comment(&post_id, &user.id, &content)
    })
    .await?
    .map_err(not_found_as("post"))?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            id: row.id,
            post_id: row.post_id,
            user_id: row.user_id,
            content: row.content,
            created_at: row.created_at,
        }),
    ))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    tokio::task::spawn_blocking(move || state.db.delete_comment(&comment_id, &user.id))
        .await?
        .map_err(not_found_as("comment"))?;

    Ok(StatusCode::NO_CONTENT)
}

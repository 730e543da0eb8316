//! Comments nested under posts

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::{delete, get}};
use serde::Serialize;

use super::auth::AuthUser;
use super::dto::{CommentResponse, CreateCommentRequest};
use super::extract::{ApiJson, ApiPath, Paging};
use crate::AppState;
use crate::domain::Page;
use crate::services::envelope::{self, Envelope};
use crate::services::error::ApiError;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts/{id}/comments", get(list_comments).post(create_comment))
        .route("/posts/{id}/comments/{comment_id}", delete(delete_comment))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommentPageData {
    message: &'static str,
    comments: Vec<CommentResponse>,
    next_cursor: Option<String>,
}

#[derive(Serialize)]
struct CommentData {
    message: &'static str,
    comment: CommentResponse,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeletedCommentData {
    message: &'static str,
    deleted_comment_id: i64,
}

/// GET /posts/{id}/comments - Newest first
async fn list_comments(
    State(state): State<Arc<AppState>>,
    ApiPath(post_id): ApiPath<i64>,
    Paging(page): Paging,
) -> Result<Json<Envelope<CommentPageData>>, ApiError> {
    if state.store.post_by_id(post_id).await?.is_none() {
        return Err(ApiError::NotFound("Post not found.".into()));
    }

    let Page { items, next_cursor } = state.store.page_comments(post_id, page).await?;
    Ok(envelope::ok(CommentPageData {
        message: "Comments retrieved successfully.",
        comments: items.into_iter().map(CommentResponse::from).collect(),
        next_cursor,
    }))
}

/// POST /posts/{id}/comments
async fn create_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    ApiPath(post_id): ApiPath<i64>,
    ApiJson(body): ApiJson<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Envelope<CommentData>>), ApiError> {
    let content = body.validate()?;
    if !state.content_limiter.check(user_id) {
        return Err(ApiError::TooManyRequests);
    }

    let comment = state.store.create_comment(user_id, post_id, &content).await?;
    tracing::debug!(comment_id = comment.id, post_id, user_id, "comment created");

    Ok(envelope::created(CommentData {
        message: "Comment created successfully.",
        comment: comment.into(),
    }))
}

/// DELETE /posts/{id}/comments/{comment_id} - Comment author only
async fn delete_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    ApiPath((post_id, comment_id)): ApiPath<(i64, i64)>,
) -> Result<Json<Envelope<DeletedCommentData>>, ApiError> {
    let comment = state
        .store
        .comment_by_id(comment_id)
        .await?
        .filter(|c| c.post_id == post_id)
        .ok_or_else(|| ApiError::NotFound("Comment not found.".into()))?;

    if comment.author_id != user_id {
        return Err(ApiError::Unauthorized(
            "You are not allowed to delete this comment.".into(),
        ));
    }

    if !state.store.delete_comment(comment_id).await? {
        return Err(ApiError::NotFound("Comment not found.".into()));
    }

    Ok(envelope::ok(DeletedCommentData {
        message: "Comment deleted successfully.",
        deleted_comment_id: comment_id,
    }))
}

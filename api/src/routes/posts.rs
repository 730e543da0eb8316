//! Post feeds and post CRUD

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use serde::Serialize;

use super::auth::AuthUser;
use super::dto::{CreatePostRequest, PostResponse};
use super::extract::{ApiJson, ApiPath, Paging};
use crate::AppState;
use crate::domain::{Page, PageRequest, PostFilter};
use crate::services::envelope::{self, Envelope};
use crate::services::error::ApiError;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/me", get(list_my_posts))
        .route("/posts/following", get(list_following_posts))
        .route("/posts/user/{id}", get(list_user_posts))
        .route("/posts/{id}", get(get_post).delete(delete_post))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostPageData {
    message: &'static str,
    posts: Vec<PostResponse>,
    next_cursor: Option<String>,
}

#[derive(Serialize)]
struct PostData {
    message: &'static str,
    post: PostResponse,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeletedPostData {
    message: &'static str,
    deleted_post_id: i64,
}

async fn page_of(
    state: &AppState,
    filter: PostFilter,
    page: PageRequest,
) -> Result<Json<Envelope<PostPageData>>, ApiError> {
    let Page { items, next_cursor } = state.store.page_posts(&filter, page).await?;
    Ok(envelope::ok(PostPageData {
        message: "Posts retrieved successfully.",
        posts: items.into_iter().map(PostResponse::from).collect(),
        next_cursor,
    }))
}

/// GET /posts - Global feed, newest first
async fn list_posts(
    State(state): State<Arc<AppState>>,
    Paging(page): Paging,
) -> Result<Json<Envelope<PostPageData>>, ApiError> {
    page_of(&state, PostFilter::All, page).await
}

/// GET /posts/me - Own posts
async fn list_my_posts(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Paging(page): Paging,
) -> Result<Json<Envelope<PostPageData>>, ApiError> {
    page_of(&state, PostFilter::Author(user_id), page).await
}

/// GET /posts/following - Posts by users the caller follows
async fn list_following_posts(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Paging(page): Paging,
) -> Result<Json<Envelope<PostPageData>>, ApiError> {
    let me = state
        .store
        .user_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("User is not authenticated.".into()))?;

    page_of(&state, PostFilter::Authors(me.following), page).await
}

/// GET /posts/user/{id} - Posts by one user
async fn list_user_posts(
    State(state): State<Arc<AppState>>,
    ApiPath(author_id): ApiPath<i64>,
    Paging(page): Paging,
) -> Result<Json<Envelope<PostPageData>>, ApiError> {
    if state.store.user_by_id(author_id).await?.is_none() {
        return Err(ApiError::NotFound("User not found.".into()));
    }
    page_of(&state, PostFilter::Author(author_id), page).await
}

/// GET /posts/{id}
async fn get_post(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Envelope<PostData>>, ApiError> {
    let post = state
        .store
        .post_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found.".into()))?;

    Ok(envelope::ok(PostData {
        message: "Post retrieved successfully.",
        post: post.into(),
    }))
}

/// POST /posts
async fn create_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<CreatePostRequest>,
) -> Result<(StatusCode, Json<Envelope<PostData>>), ApiError> {
    let content = body.validate()?;
    if !state.content_limiter.check(user_id) {
        return Err(ApiError::TooManyRequests);
    }

    let post = state.store.create_post(user_id, &content).await?;
    tracing::debug!(post_id = post.id, user_id, "post created");

    Ok(envelope::created(PostData {
        message: "Post created successfully.",
        post: post.into(),
    }))
}

/// DELETE /posts/{id} - Owner only; removes the post's comments too
async fn delete_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Envelope<DeletedPostData>>, ApiError> {
    let post = state
        .store
        .post_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found.".into()))?;

    if post.author_id != user_id {
        return Err(ApiError::Unauthorized(
            "You are not allowed to delete this post.".into(),
        ));
    }

    if !state.store.delete_post(id).await? {
        return Err(ApiError::NotFound("Post not found.".into()));
    }

    Ok(envelope::ok(DeletedPostData {
        message: "Post deleted successfully.",
        deleted_post_id: id,
    }))
}

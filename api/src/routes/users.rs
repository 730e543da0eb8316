//! Profiles, account management and the follow graph

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;

use super::auth::{AuthUser, MaybeAuthUser};
use super::dto::{
    MessageData, PatchUserRequest, ProfileResponse, UserResponse, UserSummaryResponse,
};
use super::extract::{ApiJson, ApiPath};
use crate::AppState;
use crate::services::envelope::{self, Envelope};
use crate::services::error::ApiError;
use crate::services::{graph, password};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/me", axum::routing::patch(patch_me).delete(delete_me))
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/followers", get(get_followers))
        .route("/users/{id}/following", get(get_following))
        .route("/users/{id}/is-following", get(get_is_following))
        .route("/users/follow/{id}", post(follow))
        .route("/users/unfollow/{id}", post(unfollow))
}

#[derive(Serialize)]
struct ProfileData {
    message: &'static str,
    user: ProfileResponse,
}

#[derive(Serialize)]
struct AccountData {
    message: &'static str,
    user: UserResponse,
}

#[derive(Serialize)]
struct UserListData {
    message: &'static str,
    users: Vec<UserSummaryResponse>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IsFollowingData {
    is_following: bool,
}

/// GET /users/{id} - Public profile; `isFollowing` set for signed-in callers
async fn get_user(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Envelope<ProfileData>>, ApiError> {
    let user = state
        .store
        .user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found.".into()))?;

    Ok(envelope::ok(ProfileData {
        message: "User retrieved successfully.",
        user: ProfileResponse::new(user, viewer),
    }))
}

/// PATCH /users/me - Update own profile
async fn patch_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<PatchUserRequest>,
) -> Result<Json<Envelope<AccountData>>, ApiError> {
    let (mut patch, new_password) = body.validate()?;
    if let Some(plain) = new_password {
        patch.password_hash = Some(password::hash_blocking(plain).await?);
    }

    let user = state.store.update_user(user_id, patch).await?;

    Ok(envelope::ok(AccountData {
        message: "User updated successfully.",
        user: user.into(),
    }))
}

/// DELETE /users/me - Delete own account with its posts, comments and edges
async fn delete_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Envelope<MessageData>>, ApiError> {
    graph::delete_account(state.store.as_ref(), user_id).await?;
    Ok(envelope::ok(MessageData {
        message: "User deleted successfully.",
    }))
}

/// GET /users/{id}/followers
async fn get_followers(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Envelope<UserListData>>, ApiError> {
    let users = graph::followers_of(state.store.as_ref(), id).await?;
    Ok(envelope::ok(UserListData {
        message: "Followers retrieved successfully.",
        users: users.into_iter().map(Into::into).collect(),
    }))
}

/// GET /users/{id}/following
async fn get_following(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Envelope<UserListData>>, ApiError> {
    let users = graph::following_of(state.store.as_ref(), id).await?;
    Ok(envelope::ok(UserListData {
        message: "Following retrieved successfully.",
        users: users.into_iter().map(Into::into).collect(),
    }))
}

/// GET /users/{id}/is-following - Does the caller follow {id}
async fn get_is_following(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Envelope<IsFollowingData>>, ApiError> {
    let is_following = graph::is_following(state.store.as_ref(), user_id, id).await?;
    Ok(envelope::ok(IsFollowingData { is_following }))
}

/// POST /users/follow/{id}
async fn follow(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Envelope<MessageData>>, ApiError> {
    graph::follow(state.store.as_ref(), user_id, id).await?;
    Ok(envelope::ok(MessageData {
        message: "User followed successfully.",
    }))
}

/// POST /users/unfollow/{id}
async fn unfollow(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Envelope<MessageData>>, ApiError> {
    graph::unfollow(state.store.as_ref(), user_id, id).await?;
    Ok(envelope::ok(MessageData {
        message: "User unfollowed successfully.",
    }))
}

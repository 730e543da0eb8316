//! Follow-graph operations on top of the store
//!
//! An edge a -> b is recorded twice: `b` in `a.following` and `a` in
//! `b.followers`. Adds and removes are idempotent.

use super::error::ApiError;
use crate::models::UserSummary;
use crate::store::Store;

fn reject_self(follower: i64, followee: i64, verb: &str) -> Result<(), ApiError> {
    if follower == followee {
        return Err(ApiError::BadRequest(format!("You cannot {} yourself.", verb)));
    }
    Ok(())
}

async fn require_user(store: &dyn Store, id: i64) -> Result<(), ApiError> {
    match store.user_by_id(id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::NotFound("User not found.".into())),
    }
}

pub async fn follow(store: &dyn Store, follower: i64, followee: i64) -> Result<(), ApiError> {
    reject_self(follower, followee, "follow")?;
    require_user(store, followee).await?;
    store.add_follow(follower, followee).await?;
    tracing::debug!(follower, followee, "follow");
    Ok(())
}

pub async fn unfollow(store: &dyn Store, follower: i64, followee: i64) -> Result<(), ApiError> {
    reject_self(follower, followee, "unfollow")?;
    require_user(store, followee).await?;
    store.remove_follow(follower, followee).await?;
    tracing::debug!(follower, followee, "unfollow");
    Ok(())
}

/// True when `follower` appears in `followee.followers`
pub async fn is_following(store: &dyn Store, follower: i64, followee: i64) -> Result<bool, ApiError> {
    let user = store
        .user_by_id(followee)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found.".into()))?;
    Ok(user.followers.contains(&follower))
}

pub async fn followers_of(store: &dyn Store, user_id: i64) -> Result<Vec<UserSummary>, ApiError> {
    let user = store
        .user_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found.".into()))?;
    Ok(store.user_summaries(&user.followers).await?)
}

pub async fn following_of(store: &dyn Store, user_id: i64) -> Result<Vec<UserSummary>, ApiError> {
    let user = store
        .user_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found.".into()))?;
    Ok(store.user_summaries(&user.following).await?)
}

/// Delete an account together with its posts, comments and follow edges
pub async fn delete_account(store: &dyn Store, user_id: i64) -> Result<(), ApiError> {
    if store.delete_user(user_id).await? {
        Ok(())
    } else {
        Err(ApiError::NotFound("User not found.".into()))
    }
}

//! Postgres-backed store. Multi-row writes run in one transaction each.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{Store, StoreError, StoreResult};
use crate::domain::follows::{self, FollowColumn};
use crate::domain::{PostFilter, comments, posts, users};
use crate::models::{Comment, NewUser, Post, User, UserPatch, UserSummary};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Translate constraint violations into domain errors
fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let field = match db.constraint() {
                Some(c) if c.contains("nickname") => "Nickname",
                Some(c) if c.contains("email") => "Email",
                _ => "Record",
            };
            return StoreError::Conflict(field);
        }
        if db.is_foreign_key_violation() {
            return StoreError::NotFound("User");
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        users::insert_user(&self.pool, &user)
            .await
            .map_err(map_write_error)
    }

    async fn user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(users::get_user_by_id(&self.pool, id).await?)
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(users::get_user_by_email(&self.pool, email).await?)
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> StoreResult<User> {
        users::update_user(&self.pool, id, &patch)
            .await
            .map_err(map_write_error)?
            .ok_or(StoreError::NotFound("User"))
    }

    async fn delete_user(&self, id: i64) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        if users::get_user_by_id(&mut *tx, id).await?.is_none() {
            return Ok(false);
        }

        posts::lock_posts_by_author(&mut *tx, id).await?;
        let removed = comments::delete_comments_for_user(&mut *tx, id).await?;
        if !removed.is_empty() {
            posts::strip_comment_ids(&mut *tx, &removed).await?;
        }
        let dropped_posts = posts::delete_posts_by_author(&mut *tx, id).await?;
        follows::remove_everywhere(&mut *tx, id).await?;
        let deleted = users::delete_user(&mut *tx, id).await?;

        tx.commit().await?;

        tracing::info!(
            user_id = id,
            posts = dropped_posts,
            comments = removed.len(),
            "deleted account"
        );
        Ok(deleted)
    }

    async fn user_summaries(&self, ids: &[i64]) -> StoreResult<Vec<UserSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(users::list_summaries(&self.pool, ids).await?)
    }

    async fn add_follow(&self, follower: i64, followee: i64) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let wanted = if follower == followee { 1 } else { 2 };
        if users::lock_users(&mut *tx, &[follower, followee]).await? < wanted {
            return Err(StoreError::NotFound("User"));
        }
        follows::add_to_list(&mut *tx, FollowColumn::Following, follower, followee).await?;
        follows::add_to_list(&mut *tx, FollowColumn::Followers, followee, follower).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn remove_follow(&self, follower: i64, followee: i64) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        if users::get_user_by_id(&mut *tx, followee).await?.is_none() {
            return Err(StoreError::NotFound("User"));
        }
        follows::remove_from_list(&mut *tx, FollowColumn::Following, follower, followee).await?;
        follows::remove_from_list(&mut *tx, FollowColumn::Followers, followee, follower).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn create_post(&self, author_id: i64, content: &str) -> StoreResult<Post> {
        let mut tx = self.pool.begin().await?;
        let id = posts::insert_post(&mut *tx, author_id, content)
            .await
            .map_err(map_write_error)?;
        let post = posts::get_post(&mut *tx, id)
            .await?
            .ok_or(StoreError::NotFound("Post"))?;
        tx.commit().await?;
        Ok(post)
    }

    async fn post_by_id(&self, id: i64) -> StoreResult<Option<Post>> {
        Ok(posts::get_post(&self.pool, id).await?)
    }

    async fn posts_before(
        &self,
        filter: &PostFilter,
        before: Option<i64>,
        take: i64,
    ) -> StoreResult<Vec<Post>> {
        if let PostFilter::Authors(ids) = filter {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
        }
        Ok(posts::list_posts_before(&self.pool, filter, before, take).await?)
    }

    async fn delete_post(&self, id: i64) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        if !posts::lock_post(&mut *tx, id).await? {
            return Ok(false);
        }
        comments::delete_comments_on_post(&mut *tx, id).await?;
        let deleted = posts::delete_post(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    async fn create_comment(&self, author_id: i64, post_id: i64, content: &str) -> StoreResult<Comment> {
        let mut tx = self.pool.begin().await?;
        if !posts::lock_post(&mut *tx, post_id).await? {
            return Err(StoreError::NotFound("Post"));
        }
        let id = comments::insert_comment(&mut *tx, author_id, post_id, content)
            .await
            .map_err(map_write_error)?;
        posts::append_comment_id(&mut *tx, post_id, id).await?;
        let comment = comments::get_comment(&mut *tx, id)
            .await?
            .ok_or(StoreError::NotFound("Comment"))?;
        tx.commit().await?;
        Ok(comment)
    }

    async fn comment_by_id(&self, id: i64) -> StoreResult<Option<Comment>> {
        Ok(comments::get_comment(&self.pool, id).await?)
    }

    async fn comments_before(
        &self,
        post_id: i64,
        before: Option<i64>,
        take: i64,
    ) -> StoreResult<Vec<Comment>> {
        Ok(comments::list_comments_before(&self.pool, post_id, before, take).await?)
    }

    async fn delete_comment(&self, id: i64) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let Some(_post_id) = comments::delete_comment(&mut *tx, id).await? else {
            return Ok(false);
        };
        posts::strip_comment_ids(&mut *tx, &[id]).await?;
        tx.commit().await?;
        Ok(true)
    }
}

//! Persistence boundary
//!
//! Handlers talk to a `Store` trait object so the same routes run against
//! Postgres in production and against `MemoryStore` in tests or local runs.
//! Every method is atomic on its own; nothing spans two calls.

pub mod memory;
pub mod migrations;
pub mod postgres;

use async_trait::async_trait;

use crate::domain::{Page, PageRequest, PostFilter};
use crate::models::{Comment, NewUser, Post, User, UserPatch, UserSummary};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Referenced entity is missing (payload names the resource)
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Unique constraint hit (payload names the field)
    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync + 'static {
    // Users
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn user_by_id(&self, id: i64) -> StoreResult<Option<User>>;
    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn update_user(&self, id: i64, patch: UserPatch) -> StoreResult<User>;
    /// Delete a user with their posts, comments and follow edges.
    /// Returns false if the user did not exist.
    async fn delete_user(&self, id: i64) -> StoreResult<bool>;
    /// Summaries for existing ids, in input order; unknown ids are skipped
    async fn user_summaries(&self, ids: &[i64]) -> StoreResult<Vec<UserSummary>>;

    // Follow graph
    /// Add `followee` to `follower.following` and `follower` to `followee.followers`
    async fn add_follow(&self, follower: i64, followee: i64) -> StoreResult<()>;
    /// Inverse of `add_follow`; absent edges are a no-op
    async fn remove_follow(&self, follower: i64, followee: i64) -> StoreResult<()>;

    // Posts
    async fn create_post(&self, author_id: i64, content: &str) -> StoreResult<Post>;
    async fn post_by_id(&self, id: i64) -> StoreResult<Option<Post>>;
    /// Up to `take` matching posts with id below `before`, newest first
    async fn posts_before(
        &self,
        filter: &PostFilter,
        before: Option<i64>,
        take: i64,
    ) -> StoreResult<Vec<Post>>;
    /// Delete a post and its comments
    async fn delete_post(&self, id: i64) -> StoreResult<bool>;

    // Comments
    async fn create_comment(&self, author_id: i64, post_id: i64, content: &str) -> StoreResult<Comment>;
    async fn comment_by_id(&self, id: i64) -> StoreResult<Option<Comment>>;
    async fn comments_before(
        &self,
        post_id: i64,
        before: Option<i64>,
        take: i64,
    ) -> StoreResult<Vec<Comment>>;
    /// Delete a comment and unlink it from its post
    async fn delete_comment(&self, id: i64) -> StoreResult<bool>;

    async fn page_posts(&self, filter: &PostFilter, page: PageRequest) -> StoreResult<Page<Post>> {
        let rows = self.posts_before(filter, page.before, page.fetch_size()).await?;
        Ok(Page::from_overfetch(rows, page.limit, |p| p.id))
    }

    async fn page_comments(&self, post_id: i64, page: PageRequest) -> StoreResult<Page<Comment>> {
        let rows = self
            .comments_before(post_id, page.before, page.fetch_size())
            .await?;
        Ok(Page::from_overfetch(rows, page.limit, |c| c.id))
    }
}

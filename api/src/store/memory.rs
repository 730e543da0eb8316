//! In-process store behind a single lock.
//!
//! Used by the router tests and by `STORAGE_BACKEND=memory` for local runs.
//! Each trait method takes the write lock once, so multi-record updates are
//! never observed half-applied.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{Store, StoreError, StoreResult};
use crate::domain::PostFilter;
use crate::domain::follows::{insert_unique, remove_all};
use crate::models::{Comment, NewUser, Post, User, UserPatch, UserSummary};

#[derive(Debug, Clone)]
struct PostRecord {
    id: i64,
    author_id: i64,
    content: String,
    comment_ids: Vec<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CommentRecord {
    id: i64,
    post_id: i64,
    author_id: i64,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    users: BTreeMap<i64, User>,
    posts: BTreeMap<i64, PostRecord>,
    comments: BTreeMap<i64, CommentRecord>,
    next_user_id: i64,
    next_post_id: i64,
    next_comment_id: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl Inner {
    fn nickname_of(&self, user_id: i64) -> Option<String> {
        self.users.get(&user_id).map(|u| u.nickname.clone())
    }

    fn post_view(&self, rec: &PostRecord) -> Option<Post> {
        Some(Post {
            id: rec.id,
            author_id: rec.author_id,
            author_nickname: self.nickname_of(rec.author_id)?,
            content: rec.content.clone(),
            comment_ids: rec.comment_ids.clone(),
            created_at: rec.created_at,
            updated_at: rec.updated_at,
        })
    }

    fn comment_view(&self, rec: &CommentRecord) -> Option<Comment> {
        Some(Comment {
            id: rec.id,
            post_id: rec.post_id,
            author_id: rec.author_id,
            author_nickname: self.nickname_of(rec.author_id)?,
            content: rec.content.clone(),
            created_at: rec.created_at,
            updated_at: rec.updated_at,
        })
    }

    /// Reject a nickname/email already owned by someone other than `except`
    fn check_unique(&self, nickname: Option<&str>, email: Option<&str>, except: Option<i64>) -> StoreResult<()> {
        for user in self.users.values() {
            if Some(user.id) == except {
                continue;
            }
            if nickname.is_some_and(|n| n == user.nickname) {
                return Err(StoreError::Conflict("Nickname"));
            }
            if email.is_some_and(|e| e == user.email) {
                return Err(StoreError::Conflict("Email"));
            }
        }
        Ok(())
    }

    fn remove_comments(&mut self, ids: &[i64]) {
        for id in ids {
            if let Some(rec) = self.comments.remove(id) {
                if let Some(post) = self.posts.get_mut(&rec.post_id) {
                    remove_all(&mut post.comment_ids, rec.id);
                }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        inner.check_unique(Some(&user.nickname), Some(&user.email), None)?;

        let now = Utc::now();
        let id = next_id(&mut inner.next_user_id);
        let row = User {
            id,
            nickname: user.nickname,
            email: user.email,
            password_hash: user.password_hash,
            bio: None,
            avatar_url: None,
            followers: Vec::new(),
            following: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(id, row.clone());
        Ok(row)
    }

    async fn user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&id) {
            return Err(StoreError::NotFound("User"));
        }
        inner.check_unique(patch.nickname.as_deref(), patch.email.as_deref(), Some(id))?;

        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound("User"))?;
        if let Some(nickname) = patch.nickname {
            user.nickname = nickname;
        }
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(hash) = patch.password_hash {
            user.password_hash = hash;
        }
        if let Some(bio) = patch.bio {
            user.bio = bio;
        }
        if let Some(avatar_url) = patch.avatar_url {
            user.avatar_url = avatar_url;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete_user(&self, id: i64) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        if inner.users.remove(&id).is_none() {
            return Ok(false);
        }

        let own_posts: Vec<i64> = inner
            .posts
            .values()
            .filter(|p| p.author_id == id)
            .map(|p| p.id)
            .collect();

        let doomed: Vec<i64> = inner
            .comments
            .values()
            .filter(|c| c.author_id == id || own_posts.contains(&c.post_id))
            .map(|c| c.id)
            .collect();
        inner.remove_comments(&doomed);

        for post_id in &own_posts {
            inner.posts.remove(post_id);
        }

        for user in inner.users.values_mut() {
            remove_all(&mut user.followers, id);
            remove_all(&mut user.following, id);
        }

        tracing::info!(
            user_id = id,
            posts = own_posts.len(),
            comments = doomed.len(),
            "deleted account"
        );
        Ok(true)
    }

    async fn user_summaries(&self, ids: &[i64]) -> StoreResult<Vec<UserSummary>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.users.get(id))
            .map(UserSummary::from)
            .collect())
    }

    async fn add_follow(&self, follower: i64, followee: i64) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&follower) || !inner.users.contains_key(&followee) {
            return Err(StoreError::NotFound("User"));
        }
        if let Some(user) = inner.users.get_mut(&follower) {
            insert_unique(&mut user.following, followee);
        }
        if let Some(user) = inner.users.get_mut(&followee) {
            insert_unique(&mut user.followers, follower);
        }
        Ok(())
    }

    async fn remove_follow(&self, follower: i64, followee: i64) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&followee) {
            return Err(StoreError::NotFound("User"));
        }
        if let Some(user) = inner.users.get_mut(&follower) {
            remove_all(&mut user.following, followee);
        }
        if let Some(user) = inner.users.get_mut(&followee) {
            remove_all(&mut user.followers, follower);
        }
        Ok(())
    }

    async fn create_post(&self, author_id: i64, content: &str) -> StoreResult<Post> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&author_id) {
            return Err(StoreError::NotFound("User"));
        }
        let now = Utc::now();
        let id = next_id(&mut inner.next_post_id);
        let rec = PostRecord {
            id,
            author_id,
            content: content.to_owned(),
            comment_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let view = inner.post_view(&rec).ok_or(StoreError::NotFound("User"))?;
        inner.posts.insert(id, rec);
        Ok(view)
    }

    async fn post_by_id(&self, id: i64) -> StoreResult<Option<Post>> {
        let inner = self.inner.read().await;
        Ok(inner.posts.get(&id).and_then(|rec| inner.post_view(rec)))
    }

    async fn posts_before(
        &self,
        filter: &PostFilter,
        before: Option<i64>,
        take: i64,
    ) -> StoreResult<Vec<Post>> {
        let inner = self.inner.read().await;
        let upper = before.unwrap_or(i64::MAX);
        let take = usize::try_from(take).unwrap_or(0);
        Ok(inner
            .posts
            .range(..upper)
            .rev()
            .map(|(_, rec)| rec)
            .filter(|rec| filter.matches(rec.author_id))
            .filter_map(|rec| inner.post_view(rec))
            .take(take)
            .collect())
    }

    async fn delete_post(&self, id: i64) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(rec) = inner.posts.remove(&id) else {
            return Ok(false);
        };
        inner.comments.retain(|_, c| c.post_id != rec.id);
        Ok(true)
    }

    async fn create_comment(&self, author_id: i64, post_id: i64, content: &str) -> StoreResult<Comment> {
        let mut inner = self.inner.write().await;
        if !inner.posts.contains_key(&post_id) {
            return Err(StoreError::NotFound("Post"));
        }
        if !inner.users.contains_key(&author_id) {
            return Err(StoreError::NotFound("User"));
        }

        let now = Utc::now();
        let id = next_id(&mut inner.next_comment_id);
        let rec = CommentRecord {
            id,
            post_id,
            author_id,
            content: content.to_owned(),
            created_at: now,
            updated_at: now,
        };
        let view = inner.comment_view(&rec).ok_or(StoreError::NotFound("User"))?;
        inner.comments.insert(id, rec);
        if let Some(post) = inner.posts.get_mut(&post_id) {
            post.comment_ids.push(id);
        }
        Ok(view)
    }

    async fn comment_by_id(&self, id: i64) -> StoreResult<Option<Comment>> {
        let inner = self.inner.read().await;
        Ok(inner.comments.get(&id).and_then(|rec| inner.comment_view(rec)))
    }

    async fn comments_before(
        &self,
        post_id: i64,
        before: Option<i64>,
        take: i64,
    ) -> StoreResult<Vec<Comment>> {
        let inner = self.inner.read().await;
        let upper = before.unwrap_or(i64::MAX);
        let take = usize::try_from(take).unwrap_or(0);
        Ok(inner
            .comments
            .range(..upper)
            .rev()
            .map(|(_, rec)| rec)
            .filter(|rec| rec.post_id == post_id)
            .filter_map(|rec| inner.comment_view(rec))
            .take(take)
            .collect())
    }

    async fn delete_comment(&self, id: i64) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        if !inner.comments.contains_key(&id) {
            return Ok(false);
        }
        inner.remove_comments(&[id]);
        Ok(true)
    }
}

//! Request bodies and response shapes shared across route modules
//!
//! Wire names are camelCase. Request types validate into domain inputs; every
//! failing rule is reported in one 400.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{Comment, Post, User, UserPatch, UserSummary};
use crate::services::error::ApiError;
use crate::services::validation::{
    self, ContentKind, Problems, avatar_problem, bio_problem, email_problem, nickname_problem,
    password_problem,
};

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Register input after normalisation; the password is still plaintext
#[derive(Debug)]
pub struct Registration {
    pub nickname: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(self) -> Result<Registration, ApiError> {
        let nickname = self.nickname.trim().to_string();
        let email = validation::normalize_email(&self.email);

        let mut problems = Problems::new();
        problems.push(nickname_problem(&nickname));
        problems.push(email_problem(&email));
        problems.push(password_problem(&self.password));
        problems.finish()?;

        Ok(Registration {
            nickname,
            email,
            password: self.password,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    /// Returns the normalised email and the password
    pub fn validate(self) -> Result<(String, String), ApiError> {
        let email = validation::normalize_email(&self.email);
        if email.is_empty() || self.password.is_empty() {
            return Err(ApiError::bad_request("Email and password are required."));
        }
        Ok((email, self.password))
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchUserRequest {
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub avatar_url: Option<Option<String>>,
}

impl PatchUserRequest {
    /// Validated patch plus the new plaintext password, if any.
    /// An empty bio or avatar URL clears the field.
    pub fn validate(self) -> Result<(UserPatch, Option<String>), ApiError> {
        let nickname = self.nickname.map(|n| n.trim().to_string());
        let email = self.email.as_deref().map(validation::normalize_email);
        let bio = self.bio.map(|b| b.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()));
        let avatar_url = self
            .avatar_url
            .map(|a| a.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()));

        let mut problems = Problems::new();
        problems.push(nickname.as_deref().and_then(nickname_problem));
        problems.push(email.as_deref().and_then(email_problem));
        problems.push(self.password.as_deref().and_then(password_problem));
        problems.push(bio.clone().flatten().as_deref().and_then(bio_problem));
        problems.push(avatar_url.clone().flatten().as_deref().and_then(avatar_problem));
        problems.finish()?;

        let patch = UserPatch {
            nickname,
            email,
            password_hash: None,
            bio,
            avatar_url,
        };
        if patch.is_empty() && self.password.is_none() {
            return Err(ApiError::bad_request("No valid update data provided."));
        }
        Ok((patch, self.password))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub content: String,
}

impl CreatePostRequest {
    pub fn validate(self) -> Result<String, ApiError> {
        validation::content(&self.content, ContentKind::Post)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[serde(default, alias = "content")]
    pub comment_content: String,
}

impl CreateCommentRequest {
    pub fn validate(self) -> Result<String, ApiError> {
        validation::content(&self.comment_content, ContentKind::Comment)
    }
}

// ============================================================================
// Responses
// ============================================================================

/// The caller's own account, including email and follow lists
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub nickname: String,
    pub email: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub followers: Vec<i64>,
    pub following: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // password_hash intentionally omitted
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            nickname: u.nickname,
            email: u.email,
            bio: u.bio,
            avatar_url: u.avatar_url,
            followers: u.followers,
            following: u.following,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Public profile. `is_following` is null for anonymous callers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: i64,
    pub nickname: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub followers_count: usize,
    pub following_count: usize,
    pub is_following: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl ProfileResponse {
    pub fn new(user: User, viewer: Option<i64>) -> Self {
        Self {
            is_following: viewer.map(|v| user.followers.contains(&v)),
            followers_count: user.followers.len(),
            following_count: user.following.len(),
            id: user.id,
            nickname: user.nickname,
            bio: user.bio,
            avatar_url: user.avatar_url,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummaryResponse {
    pub id: i64,
    pub nickname: String,
    pub avatar_url: Option<String>,
}

impl From<UserSummary> for UserSummaryResponse {
    fn from(s: UserSummary) -> Self {
        Self {
            id: s.id,
            nickname: s.nickname,
            avatar_url: s.avatar_url,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: i64,
    pub author_id: i64,
    pub author_nickname: String,
    pub content: String,
    pub comment_ids: Vec<i64>,
    pub comment_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Post> for PostResponse {
    fn from(p: Post) -> Self {
        Self {
            comment_count: p.comment_ids.len(),
            id: p.id,
            author_id: p.author_id,
            author_nickname: p.author_nickname,
            content: p.content,
            comment_ids: p.comment_ids,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_nickname: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(c: Comment) -> Self {
        Self {
            id: c.id,
            post_id: c.post_id,
            author_id: c.author_id,
            author_nickname: c.author_nickname,
            content: c.content,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Payload of endpoints that only confirm an action
#[derive(Debug, Serialize)]
pub struct MessageData {
    pub message: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let req: PatchUserRequest = serde_json::from_str(r#"{"bio": null}"#).unwrap();
        assert_eq!(req.bio, Some(None));
        assert_eq!(req.avatar_url, None);

        let (patch, password) = req.validate().unwrap();
        assert_eq!(patch.bio, Some(None));
        assert!(password.is_none());
    }

    #[test]
    fn empty_patch_is_rejected() {
        let req: PatchUserRequest = serde_json::from_str("{}").unwrap();
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "No valid update data provided.");
    }

    #[test]
    fn patch_reports_every_problem() {
        let req: PatchUserRequest =
            serde_json::from_str(r#"{"nickname": "a b", "avatarUrl": "nope"}"#).unwrap();
        let err = req.validate().unwrap_err().to_string();
        assert!(err.contains("Nickname"));
        assert!(err.contains("Avatar URL"));
    }

    #[test]
    fn register_normalises_email() {
        let req = RegisterRequest {
            nickname: " alice ".into(),
            email: " Alice@Example.com ".into(),
            password: "secret1".into(),
        };
        let reg = req.validate().unwrap();
        assert_eq!(reg.nickname, "alice");
        assert_eq!(reg.email, "alice@example.com");
    }

    #[test]
    fn comment_accepts_either_field_name() {
        let a: CreateCommentRequest = serde_json::from_str(r#"{"commentContent": "hi"}"#).unwrap();
        let b: CreateCommentRequest = serde_json::from_str(r#"{"content": "hi"}"#).unwrap();
        assert_eq!(a.validate().unwrap(), "hi");
        assert_eq!(b.validate().unwrap(), "hi");
    }

    #[test]
    fn profile_viewer_flag() {
        let user = User {
            id: 2,
            nickname: "bob".into(),
            email: "bob@example.com".into(),
            password_hash: "x".into(),
            bio: None,
            avatar_url: None,
            followers: vec![1],
            following: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(ProfileResponse::new(user.clone(), None).is_following, None);
        assert_eq!(ProfileResponse::new(user.clone(), Some(1)).is_following, Some(true));
        assert_eq!(ProfileResponse::new(user, Some(3)).is_following, Some(false));
    }
}

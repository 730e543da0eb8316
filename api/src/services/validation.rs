//! Input validation shared by the request DTOs
//!
//! Each check yields an optional message. A `Problems` collector gathers every
//! failing message for one request and reports them together, joined by ". ".

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::error::ApiError;
use crate::constants::{
    MAX_BIO_CHARS, MAX_CONTENT_CHARS, MAX_NICKNAME_CHARS, MIN_EMAIL_CHARS, MIN_NICKNAME_CHARS,
    MIN_PASSWORD_CHARS,
};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex compiles")
});

static NICKNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("nickname regex compiles"));

/// Posts and comments share limits but not wording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Post,
    Comment,
}

#[derive(Debug, Default)]
pub struct Problems(Vec<&'static str>);

impl Problems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, problem: Option<&'static str>) {
        if let Some(message) = problem {
            self.0.push(message);
        }
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            return Ok(());
        }
        let sentences: Vec<&str> = self.0.iter().map(|m| m.trim_end_matches('.')).collect();
        Err(ApiError::BadRequest(format!("{}.", sentences.join(". "))))
    }
}

/// Trimmed and lowercased, the form emails are stored and looked up in
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Expects an already-normalized email
pub fn email_problem(email: &str) -> Option<&'static str> {
    if email.chars().count() < MIN_EMAIL_CHARS {
        Some("Email must be at least 5 characters long.")
    } else if !EMAIL_RE.is_match(email) {
        Some("Please provide a valid email address.")
    } else {
        None
    }
}

pub fn password_problem(password: &str) -> Option<&'static str> {
    (password.chars().count() < MIN_PASSWORD_CHARS)
        .then_some("Password must contain at least 6 characters.")
}

pub fn nickname_problem(nickname: &str) -> Option<&'static str> {
    let len = nickname.chars().count();
    if !(MIN_NICKNAME_CHARS..=MAX_NICKNAME_CHARS).contains(&len) {
        Some("Nickname must be between 3 and 30 characters long.")
    } else if !NICKNAME_RE.is_match(nickname) {
        Some("Nickname may only contain letters, digits and underscores.")
    } else {
        None
    }
}

pub fn bio_problem(bio: &str) -> Option<&'static str> {
    (bio.chars().count() > MAX_BIO_CHARS).then_some("Bio must be at most 160 characters long.")
}

pub fn avatar_problem(avatar_url: &str) -> Option<&'static str> {
    match Url::parse(avatar_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => None,
        _ => Some("Avatar URL must be a valid http or https URL."),
    }
}

/// Trim and bounds-check post or comment text
pub fn content(raw: &str, kind: ContentKind) -> Result<String, ApiError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    let message = match kind {
        ContentKind::Post if len == 0 => "You cannot create an empty post.",
        ContentKind::Post if len > MAX_CONTENT_CHARS => "Post must be at most 140 characters long.",
        ContentKind::Comment if len == 0 => "You cannot create an empty comment.",
        ContentKind::Comment if len > MAX_CONTENT_CHARS => {
            "Your comment must be at most 140 characters long."
        }
        _ => return Ok(trimmed.to_string()),
    };
    Err(ApiError::BadRequest(message.to_string()))
}

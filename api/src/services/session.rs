//! Session management: stateless JWT access tokens

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id as string
    pub exp: i64,    // expiry timestamp
    pub iat: i64,    // issued at
}

#[derive(Debug, PartialEq, Eq)]
pub enum SessionError {
    InvalidToken,
    Expired,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::InvalidToken => write!(f, "Invalid token"),
            SessionError::Expired => write!(f, "Token expired"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Sign an HS256 token for `user_id` that expires after `lifetime`
pub fn create_access_token(user_id: i64, secret: &[u8], lifetime: Duration) -> Result<String, SessionError> {
    let now = Utc::now();
    let exp = now + lifetime;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|_| SessionError::InvalidToken)
}

/// Validate a JWT access token and return the user_id
pub fn validate_access_token(token: &str, secret: &[u8]) -> Result<i64, SessionError> {
    // HS256 only; a token signed with any other algorithm is rejected
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "sub", "iat"]);
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|e| {
            tracing::debug!(error = ?e, "jwt rejected");
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::InvalidToken,
            }
        })?;

    token_data
        .claims
        .sub
        .parse::<i64>()
        .map_err(|_| SessionError::InvalidToken)
}

/// Pull the token out of an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

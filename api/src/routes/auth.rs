//! Registration, login and the bearer-token extractors

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{FromRequestParts, State},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    routing::{get, post},
};
use serde::Serialize;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};

use super::dto::{LoginRequest, MessageData, RegisterRequest, UserResponse};
use super::extract::ApiJson;
use crate::AppState;
use crate::models::NewUser;
use crate::services::envelope::{self, Envelope};
use crate::services::error::{ApiError, LogErr};
use crate::services::{password, session};

pub fn routes(rate_limited: bool) -> Router<Arc<AppState>> {
    let router = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(get_me));

    if !rate_limited {
        return router;
    }

    // One token every 3 seconds per IP, bursts of 20
    let Some(rate_limit_config) = GovernorConfigBuilder::default()
        .per_second(3)
        .burst_size(20)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
    else {
        tracing::warn!("invalid auth rate limit config, serving auth routes unlimited");
        return router;
    };

    let limiter = rate_limit_config.limiter().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            limiter.retain_recent();
        }
    });

    router.layer(GovernorLayer {
        config: rate_limit_config.into(),
    })
}

// ============================================================================
// Auth Extractors - validate the bearer token and extract user_id
// ============================================================================

/// Authenticated caller. Rejects with 401 when the token is missing or invalid.
pub struct AuthUser(pub i64);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(session::bearer_token)
            .ok_or_else(|| ApiError::Unauthenticated("Authentication required.".into()))?;

        let user_id = session::validate_access_token(token, &state.jwt.secret).log_status(
            "JWT validation failed",
            ApiError::Unauthenticated("Invalid or expired token.".into()),
        )?;

        Ok(AuthUser(user_id))
    }
}

/// Caller identity if a valid token was sent; anonymous otherwise
pub struct MaybeAuthUser(pub Option<i64>);

impl FromRequestParts<Arc<AppState>> for MaybeAuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(
            AuthUser::from_request_parts(parts, state)
                .await
                .ok()
                .map(|AuthUser(id)| id),
        ))
    }
}

// ============================================================================
// Endpoints
// ============================================================================

#[derive(Serialize)]
struct SessionData {
    message: &'static str,
    user: UserResponse,
    token: String,
}

#[derive(Serialize)]
struct MeData {
    message: &'static str,
    user: UserResponse,
}

fn issue_token(state: &AppState, user_id: i64) -> Result<String, ApiError> {
    session::create_access_token(user_id, &state.jwt.secret, state.jwt.lifetime)
        .log_500("Create access token")
}

/// POST /auth/register - Create an account and return a token
async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Envelope<SessionData>>), ApiError> {
    let registration = body.validate()?;
    let password_hash = password::hash_blocking(registration.password).await?;

    let user = state
        .store
        .create_user(NewUser {
            nickname: registration.nickname,
            email: registration.email,
            password_hash,
        })
        .await?;

    tracing::info!(user_id = user.id, "user registered");

    let token = issue_token(&state, user.id)?;
    Ok(envelope::created(SessionData {
        message: "User registered successfully.",
        user: user.into(),
        token,
    }))
}

/// POST /auth/login - Verify credentials and return a token
async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<Envelope<SessionData>>, ApiError> {
    let (email, candidate) = body.validate()?;
    let bad_credentials =
        || ApiError::Unauthenticated("There is an issue with your email or password.".into());

    let user = state
        .store
        .user_by_email(&email)
        .await?
        .ok_or_else(bad_credentials)?;

    if !password::verify_blocking(candidate, user.password_hash.clone()).await? {
        return Err(bad_credentials());
    }

    let token = issue_token(&state, user.id)?;
    Ok(envelope::ok(SessionData {
        message: "Log in successful. Welcome back!",
        user: user.into(),
        token,
    }))
}

/// POST /auth/logout - Tokens are stateless; the client discards its copy
async fn logout() -> Json<Envelope<MessageData>> {
    envelope::ok(MessageData {
        message: "Good bye!",
    })
}

/// GET /auth/me - Current user
async fn get_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Envelope<MeData>>, ApiError> {
    // A valid JWT for a deleted user is still unauthenticated
    let user = state
        .store
        .user_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("User is not authenticated.".into()))?;

    Ok(envelope::ok(MeData {
        message: "User retrieved successfully.",
        user: user.into(),
    }))
}

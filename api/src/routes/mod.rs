pub mod auth;
pub mod comments;
pub mod dto;
pub mod extract;
pub mod posts;
pub mod users;

use axum::Router;
use axum::http::Uri;
use std::sync::Arc;

use crate::AppState;
use crate::services::error::ApiError;

/// Build all routes for the API (mounted under `/api/v1`)
pub fn build_routes(auth_rate_limit: bool) -> Router<Arc<AppState>> {
    Router::new()
        .merge(auth::routes(auth_rate_limit))
        .merge(users::routes())
        .merge(posts::routes())
        .merge(comments::routes())
}

/// Fallback for unknown paths
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Route {} does not exist.", uri.path()))
}

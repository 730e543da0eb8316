//! JSON and path extractors whose rejections use the error envelope

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query};

use crate::domain::{PageQuery, PageRequest};
use crate::services::error::ApiError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// `?limit=&cursor=`, normalised. A malformed cursor is a 400.
pub struct Paging(pub PageRequest);

impl<S: Send + Sync> FromRequestParts<S> for Paging {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<PageQuery>::from_request_parts(parts, state)
            .await
            .map_err(ApiError::from)?;
        let page = PageRequest::try_from(query).map_err(|e| ApiError::BadRequest(e.to_string()))?;
        Ok(Paging(page))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "json rejected");
        match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                ApiError::bad_request("Expected a JSON body with Content-Type: application/json.")
            }
            JsonRejection::JsonSyntaxError(_) => ApiError::bad_request("Malformed JSON body."),
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "path rejected");
        ApiError::bad_request("Invalid id format.")
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    async fn paging(uri: &str) -> Result<PageRequest, ApiError> {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        Paging::from_request_parts(&mut parts, &()).await.map(|Paging(page)| page)
    }

    #[tokio::test]
    async fn paging_reads_limit_and_cursor() {
        let page = paging("/posts?limit=5&cursor=42").await.unwrap();
        assert_eq!(page.limit, 5);
        assert_eq!(page.before, Some(42));
    }

    #[tokio::test]
    async fn paging_defaults_without_query() {
        let page = paging("/posts").await.unwrap();
        assert_eq!(page, PageRequest::default());
    }

    #[tokio::test]
    async fn bad_cursor_is_rejected() {
        let err = paging("/posts?cursor=abc").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}

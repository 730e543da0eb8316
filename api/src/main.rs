mod config;
mod constants;
mod domain;
mod logging;
mod models;
mod routes;
mod services;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::get,
};
use tower_http::{
    cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use config::{Config, JwtSettings, StorageBackend};
use constants::{API_PREFIX, MAX_BODY_BYTES};
use services::rate_limit::{RateLimitConfig, UserRateLimiter};
use store::{MemoryStore, PgStore, Store};

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub jwt: JwtSettings,
    /// Per-user budget for creating posts and comments
    pub content_limiter: UserRateLimiter,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, jwt: JwtSettings) -> Self {
        Self {
            store,
            jwt,
            content_limiter: UserRateLimiter::new(RateLimitConfig::CONTENT),
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub fn build_app(state: Arc<AppState>, config: &Config) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest(API_PREFIX, routes::build_routes(config.auth_rate_limit))
        .fallback(routes::not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    match config.storage {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set for the postgres backend")?;
            let pool = services::db::connect(url, config.db_max_connections)
                .await
                .context("Failed to connect to database")?;
            Ok(Arc::new(PgStore::new(pool)))
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init();

    let config = Config::from_env()?;
    tracing::info!(storage = %config.storage, port = config.port, "starting mini-community api");

    let store = open_store(&config).await?;
    let state = Arc::new(AppState::new(store, config.jwt.clone()));

    // Forget content-limit buckets of users who went quiet
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            sweeper.content_limiter.cleanup(Duration::from_secs(600));
            tracing::debug!(
                tracked = sweeper.content_limiter.tracked_users(),
                "content limiter swept"
            );
        }
    });

    let app = build_app(state, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Listening on http://{}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server failed")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, starting shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting shutdown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config::from_lookup(|key| match key {
            "JWT_SECRET" => Some("test-secret".into()),
            "STORAGE_BACKEND" => Some("memory".into()),
            "AUTH_RATE_LIMIT" => Some("false".into()),
            _ => None,
        })
        .unwrap()
    }

    fn test_app() -> Router {
        let config = test_config();
        let state = Arc::new(AppState::new(Arc::new(MemoryStore::new()), config.jwt.clone()));
        build_app(state, &config)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Registers a user and returns (id, token)
    async fn register(app: &Router, nickname: &str) -> (i64, String) {
        let (status, body) = send(
            app,
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({
                "nickname": nickname,
                "email": format!("{}@example.com", nickname),
                "password": "secret1",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let id = body["data"]["user"]["id"].as_i64().unwrap();
        let token = body["data"]["token"].as_str().unwrap().to_string();
        (id, token)
    }

    async fn create_post(app: &Router, token: &str, content: &str) -> i64 {
        let (status, body) = send(
            app,
            "POST",
            "/api/v1/posts",
            Some(token),
            Some(json!({ "content": content })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"]["post"]["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = test_app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_login_and_me() {
        let app = test_app();
        let (id, token) = register(&app, "alice").await;

        let (status, body) = send(&app, "GET", "/api/v1/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["user"]["id"], id);
        assert_eq!(body["data"]["user"]["email"], "alice@example.com");
        assert!(body["data"]["user"].get("passwordHash").is_none());

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "ALICE@example.com", "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["message"], "Log in successful. Welcome back!");
        assert!(body["data"]["token"].is_string());

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "alice@example.com", "password": "wrong-one" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "error");

        let (status, body) = send(&app, "POST", "/api/v1/auth/logout", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["message"], "Good bye!");
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let app = test_app();
        register(&app, "alice").await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({ "nickname": "alice2", "email": "alice@example.com", "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["data"]["message"], "Email already exists.");

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({ "nickname": "alice", "email": "other@example.com", "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["data"]["message"], "Nickname already exists.");
    }

    #[tokio::test]
    async fn registration_validation_is_reported_together() {
        let app = test_app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({ "nickname": "bob", "email": "not-an-email", "password": "123" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["data"]["message"],
            "Please provide a valid email address. Password must contain at least 6 characters."
        );
    }

    #[tokio::test]
    async fn malformed_json_is_enveloped() {
        let app = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/login")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn mutations_require_a_token() {
        let app = test_app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/posts",
            None,
            Some(json!({ "content": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "error");

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/posts",
            Some("garbage"),
            Some(json!({ "content": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn feed_pages_twenty_then_five() {
        let app = test_app();
        let mut all = Vec::new();
        for n in 1..=5 {
            let (_, token) = register(&app, &format!("user{}", n)).await;
            for i in 0..5 {
                all.push(create_post(&app, &token, &format!("post {} from user{}", i, n)).await);
            }
        }

        let (status, body) = send(&app, "GET", "/api/v1/posts?limit=20", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let first = body["data"]["posts"].as_array().unwrap().clone();
        assert_eq!(first.len(), 20);
        let cursor = body["data"]["nextCursor"].as_str().unwrap().to_string();
        assert_eq!(cursor, first[19]["id"].as_i64().unwrap().to_string());

        let (status, body) = send(
            &app,
            "GET",
            &format!("/api/v1/posts?limit=20&cursor={}", cursor),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let second = body["data"]["posts"].as_array().unwrap().clone();
        assert_eq!(second.len(), 5);
        assert!(body["data"]["nextCursor"].is_null());

        let mut seen: Vec<i64> = first
            .iter()
            .chain(second.iter())
            .map(|p| p["id"].as_i64().unwrap())
            .collect();
        assert!(seen.windows(2).all(|w| w[0] > w[1]));
        seen.sort();
        all.sort();
        assert_eq!(seen, all);
    }

    #[tokio::test]
    async fn malformed_cursor_is_bad_request() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/api/v1/posts?cursor=abc", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["data"]["message"], "Invalid cursor format.");

        let (status, _) = send(&app, "GET", "/api/v1/posts?limit=oops", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn follow_flow_and_profile_view() {
        let app = test_app();
        let (alice, alice_token) = register(&app, "alice").await;
        let (bob, _) = register(&app, "bob").await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/v1/users/follow/{}", alice),
            Some(&alice_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["data"]["message"], "You cannot follow yourself.");

        for _ in 0..2 {
            let (status, _) = send(
                &app,
                "POST",
                &format!("/api/v1/users/follow/{}", bob),
                Some(&alice_token),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, body) = send(
            &app,
            "GET",
            &format!("/api/v1/users/{}/is-following", bob),
            Some(&alice_token),
            None,
        )
        .await;
        assert_eq!(body["data"]["isFollowing"], true);

        let (_, body) = send(&app, "GET", &format!("/api/v1/users/{}", bob), None, None).await;
        assert!(body["data"]["user"]["isFollowing"].is_null());
        assert_eq!(body["data"]["user"]["followersCount"], 1);

        let (_, body) = send(
            &app,
            "GET",
            &format!("/api/v1/users/{}", bob),
            Some(&alice_token),
            None,
        )
        .await;
        assert_eq!(body["data"]["user"]["isFollowing"], true);

        // An invalid token on the optional-auth route is treated as anonymous
        let (status, body) = send(
            &app,
            "GET",
            &format!("/api/v1/users/{}", bob),
            Some("garbage"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["user"]["isFollowing"].is_null());

        let (_, body) = send(
            &app,
            "GET",
            &format!("/api/v1/users/{}/followers", bob),
            Some(&alice_token),
            None,
        )
        .await;
        let followers = body["data"]["users"].as_array().unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0]["nickname"], "alice");

        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/v1/users/unfollow/{}", bob),
            Some(&alice_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(
            &app,
            "GET",
            &format!("/api/v1/users/{}/is-following", bob),
            Some(&alice_token),
            None,
        )
        .await;
        assert_eq!(body["data"]["isFollowing"], false);

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/users/follow/9999",
            Some(&alice_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn following_feed_only_has_followed_authors() {
        let app = test_app();
        let (_, alice_token) = register(&app, "alice").await;
        let (bob, bob_token) = register(&app, "bob").await;
        let (_, carl_token) = register(&app, "carl").await;

        let bob_post = create_post(&app, &bob_token, "from bob").await;
        create_post(&app, &carl_token, "from carl").await;

        let (_, body) = send(&app, "GET", "/api/v1/posts/following", Some(&alice_token), None).await;
        assert!(body["data"]["posts"].as_array().unwrap().is_empty());

        send(
            &app,
            "POST",
            &format!("/api/v1/users/follow/{}", bob),
            Some(&alice_token),
            None,
        )
        .await;

        let (_, body) = send(&app, "GET", "/api/v1/posts/following", Some(&alice_token), None).await;
        let posts = body["data"]["posts"].as_array().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0]["id"], bob_post);
        assert_eq!(posts[0]["authorNickname"], "bob");

        let (_, body) = send(&app, "GET", "/api/v1/posts/me", Some(&bob_token), None).await;
        assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 1);

        let (_, body) = send(&app, "GET", &format!("/api/v1/posts/user/{}", bob), None, None).await;
        assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn only_the_owner_deletes_a_post() {
        let app = test_app();
        let (_, alice_token) = register(&app, "alice").await;
        let (_, bob_token) = register(&app, "bob").await;
        let post = create_post(&app, &alice_token, "mine").await;

        let uri = format!("/api/v1/posts/{}", post);
        let (status, body) = send(&app, "DELETE", &uri, Some(&bob_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["status"], "error");

        let (status, _) = send(&app, "DELETE", &uri, Some(&alice_token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn comment_lifecycle() {
        let app = test_app();
        let (_, alice_token) = register(&app, "alice").await;
        let (_, bob_token) = register(&app, "bob").await;
        let post = create_post(&app, &alice_token, "discuss").await;
        let comments_uri = format!("/api/v1/posts/{}/comments", post);

        let mut ids = Vec::new();
        for i in 0..3 {
            let (status, body) = send(
                &app,
                "POST",
                &comments_uri,
                Some(&bob_token),
                Some(json!({ "commentContent": format!("comment {}", i) })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            ids.push(body["data"]["comment"]["id"].as_i64().unwrap());
        }

        let (status, body) = send(&app, "POST", &comments_uri, Some(&bob_token), Some(json!({ "commentContent": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["data"]["message"], "You cannot create an empty comment.");

        let (_, body) = send(&app, "GET", &format!("{}?limit=2", comments_uri), None, None).await;
        let page = body["data"]["comments"].as_array().unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0]["id"], ids[2]);
        assert_eq!(body["data"]["nextCursor"], ids[1].to_string());

        let (_, body) = send(&app, "GET", &format!("/api/v1/posts/{}", post), None, None).await;
        assert_eq!(body["data"]["post"]["commentCount"], 3);

        let delete_uri = format!("{}/{}", comments_uri, ids[0]);
        let (status, _) = send(&app, "DELETE", &delete_uri, Some(&alice_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = send(&app, "DELETE", &delete_uri, Some(&bob_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deletedCommentId"], ids[0]);

        let (_, body) = send(&app, "GET", &format!("/api/v1/posts/{}", post), None, None).await;
        assert_eq!(body["data"]["post"]["commentIds"], json!([ids[1], ids[2]]));

        let (status, _) = send(&app, "GET", "/api/v1/posts/9999/comments", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn account_deletion_cascades() {
        let app = test_app();
        let (alice, alice_token) = register(&app, "alice").await;
        let (bob, bob_token) = register(&app, "bob").await;

        send(&app, "POST", &format!("/api/v1/users/follow/{}", alice), Some(&bob_token), None).await;
        let alice_post = create_post(&app, &alice_token, "soon gone").await;
        let bob_post = create_post(&app, &bob_token, "stays").await;
        send(
            &app,
            "POST",
            &format!("/api/v1/posts/{}/comments", bob_post),
            Some(&alice_token),
            Some(json!({ "commentContent": "bye" })),
        )
        .await;

        let (status, _) = send(&app, "DELETE", "/api/v1/users/me", Some(&alice_token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, "GET", &format!("/api/v1/posts/{}", alice_post), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(&app, "GET", &format!("/api/v1/posts/{}", bob_post), None, None).await;
        assert_eq!(body["data"]["post"]["commentCount"], 0);

        let (_, body) = send(&app, "GET", &format!("/api/v1/users/{}", bob), None, None).await;
        assert_eq!(body["data"]["user"]["followingCount"], 0);

        // The old token no longer resolves to a user
        let (status, _) = send(&app, "GET", "/api/v1/auth/me", Some(&alice_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn profile_patch() {
        let app = test_app();
        let (_, token) = register(&app, "alice").await;

        let (status, body) = send(
            &app,
            "PATCH",
            "/api/v1/users/me",
            Some(&token),
            Some(json!({ "bio": "hello", "avatarUrl": "https://cdn.example.com/a.png" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["user"]["bio"], "hello");

        let (status, _) = send(&app, "PATCH", "/api/v1/users/me", Some(&token), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "PATCH",
            "/api/v1/users/me",
            Some(&token),
            Some(json!({ "password": "brand-new" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "alice@example.com", "password": "brand-new" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn content_creation_is_rate_limited() {
        let app = test_app();
        let (_, token) = register(&app, "spammer").await;
        for i in 0..RateLimitConfig::CONTENT.max_tokens {
            create_post(&app, &token, &format!("post {}", i)).await;
        }
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/posts",
            Some(&token),
            Some(json!({ "content": "one too many" })),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn unknown_routes_and_bad_ids() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/api/v1/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");

        let (status, body) = send(&app, "GET", "/api/v1/posts/not-a-number", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["data"]["message"], "Invalid id format.");
    }
}

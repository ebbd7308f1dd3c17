#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use fortune_api::auth::jwt::{generate_access_token, JwtConfig};
use fortune_api::config::ServerConfig;
use fortune_api::routes;
use fortune_api::state::{build_orchestrator, AppState};
use fortune_cache::MemoryCounter;
use fortune_completion::{Completion, CompletionError, CompletionRequest, CompletionService, Usage};
use fortune_core::types::UserId;
use fortune_engine::{EngineConfig, RetryPolicy};
use http_body_util::BodyExt;
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
pub const TEST_SERVICE_KEY: &str = "test-service-key";

/// Build a test `ServerConfig` with safe defaults and a known service key.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
        },
        service_api_key: Some(TEST_SERVICE_KEY.to_string()),
        redis_url: None,
        retention_days: 30,
        daily_bonus_tokens: 3,
    }
}

pub fn test_engine_config() -> EngineConfig {
    EngineConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        },
        ..EngineConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Completion fake
// ---------------------------------------------------------------------------

/// Replies with one object that also carries a section per love-package
/// category, so batch generation for that package succeeds.
pub struct StaticCompletion {
    calls: AtomicU32,
}

impl StaticCompletion {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for StaticCompletion {
    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let section = json!({ "overall_score": 81, "summary": "generated" });
        let mut content = json!({ "overall_score": 81, "summary": "generated" });
        for category in [
            "love",
            "marriage",
            "compatibility",
            "couple-match",
            "chemistry",
            "ex-lover",
            "blind-date",
            "celebrity-match",
        ] {
            content[category] = section.clone();
        }
        Ok(Completion {
            content,
            model: "static-model".into(),
            usage: Usage {
                prompt_tokens: 5,
                completion_tokens: 5,
                total_tokens: 10,
            },
        })
    }

    fn model(&self) -> &str {
        "static-model"
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Build the full application router with the production middleware stack.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, StaticCompletion::new())
}

pub fn build_test_app_with(pool: PgPool, completion: Arc<StaticCompletion>) -> Router {
    let config = test_config();
    let engine = build_orchestrator(
        &pool,
        test_engine_config(),
        completion,
        None,
        Arc::new(MemoryCounter::new()),
    );

    let state = AppState {
        pool,
        config: Arc::new(config),
        engine,
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Bearer token for `user_id`, valid for an hour.
pub fn token_for(user_id: UserId) -> String {
    let config = JwtConfig {
        secret: TEST_JWT_SECRET.to_string(),
    };
    generate_access_token(user_id, 3600, &config).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST with the internal service key header, or none when `key` is `None`.
pub async fn post_service(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    key: Option<&str>,
) -> Response {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("x-service-key", key);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

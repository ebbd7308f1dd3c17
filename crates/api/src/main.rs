use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use fortune_cache::{CacheTier, MemoryCounter, RateLimitStore, RedisCounter, RedisTier};
use fortune_completion::{CompletionConfig, OpenAiClient};
use fortune_engine::EngineConfig;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fortune_api::background;
use fortune_api::config::ServerConfig;
use fortune_api::routes;
use fortune_api::state::{build_orchestrator, AppState};

/// Namespace for every key the service writes to Redis.
const REDIS_PREFIX: &str = "fortune";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v == "json");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fortune_api=debug,fortune_engine=debug,tower_http=debug".into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let engine_config = EngineConfig::from_env();
    if let Err(e) = config.check_generation_timeout(engine_config.generation_timeout) {
        panic!("Inconsistent timeouts: {e}");
    }
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = fortune_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    fortune_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    fortune_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Redis (optional) ---
    let (distributed, counter): (Option<Arc<dyn CacheTier>>, Arc<dyn RateLimitStore>) =
        match &config.redis_url {
            Some(url) => {
                let manager = fortune_cache::connect(url)
                    .await
                    .expect("Failed to connect to Redis");
                tracing::info!("Redis connection established");
                (
                    Some(Arc::new(RedisTier::new(manager.clone(), REDIS_PREFIX))),
                    Arc::new(RedisCounter::new(manager)),
                )
            }
            None => {
                tracing::warn!(
                    "REDIS_URL not set: distributed cache disabled, rate limits are per instance"
                );
                (None, Arc::new(MemoryCounter::new()))
            }
        };

    // --- Completion service ---
    let completion = OpenAiClient::new(CompletionConfig::from_env())
        .expect("Failed to build completion client");

    // --- Engine ---
    let utc_offset = engine_config.utc_offset;
    let engine = build_orchestrator(
        &pool,
        engine_config,
        Arc::new(completion),
        distributed,
        counter,
    );
    tracing::info!("Fortune engine ready");

    // --- Background jobs ---
    let cancel = CancellationToken::new();
    let jobs = vec![
        tokio::spawn(background::fortune_retention::run(
            pool.clone(),
            config.retention_days,
            cancel.clone(),
        )),
        tokio::spawn(background::daily_bonus::run(
            engine.ledger().clone(),
            config.daily_bonus_tokens,
            utc_offset,
            cancel.clone(),
        )),
        tokio::spawn(background::memory_sweep::run(
            Arc::clone(engine.resolver().memory()),
            cancel.clone(),
        )),
    ];
    tracing::info!("Background jobs started (retention, daily bonus, memory sweep)");

    // --- CORS ---
    let cors = build_cors_layer(&config);

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        engine,
    };

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        // Health check at root level (not under /api/v1).
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        // -- Middleware stack (applied bottom-up) --
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, stopping background jobs");
    cancel.cancel();
    let wait = Duration::from_secs(config.shutdown_timeout_secs);
    for job in jobs {
        if tokio::time::timeout(wait, job).await.is_err() {
            tracing::warn!("Background job did not stop in time");
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Build the CORS layer. Panics at startup on an invalid origin.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

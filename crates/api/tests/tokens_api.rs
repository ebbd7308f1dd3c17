//! HTTP-level tests for balances, history and service-side credits.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, get_auth, post_auth, post_service, token_for, StaticCompletion, TEST_SERVICE_KEY,
};
use fortune_api::background::daily_bonus;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

const CREDIT_URI: &str = "/api/v1/internal/tokens/credit";

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_first_balance_grants_welcome_bonus_once(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = token_for(Uuid::new_v4());

    for _ in 0..2 {
        let response = get_auth(app.clone(), "/api/v1/tokens/balance", &token).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["balance"], 10);
        assert_eq!(json["data"]["wallet"], 10);
        assert_eq!(json["data"]["is_unlimited"], false);
        assert_eq!(json["data"]["plan"], "free");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_history_is_newest_first_and_limited(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = token_for(Uuid::new_v4());

    post_auth(app.clone(), "/api/v1/fortunes/love", &token).await;

    let json = body_json(get_auth(app.clone(), "/api/v1/tokens/history", &token).await).await;
    let kinds: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["kind"].as_str())
        .collect();
    assert_eq!(kinds, vec!["usage", "bonus"]);
    assert_eq!(json["data"][0]["category"], "love");

    let limited =
        body_json(get_auth(app, "/api/v1/tokens/history?limit=1", &token).await).await;
    assert_eq!(limited["data"].as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_credit_is_idempotent_per_reference(pool: PgPool) {
    let app = common::build_test_app(pool);
    let user_id = Uuid::new_v4();
    let token = token_for(user_id);
    get_auth(app.clone(), "/api/v1/tokens/balance", &token).await;

    let body = json!({
        "user_id": user_id,
        "amount": 20,
        "kind": "purchase",
        "reference": "order-1001",
        "description": "20 token pack",
    });

    let first = post_service(app.clone(), CREDIT_URI, body.clone(), Some(TEST_SERVICE_KEY)).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first = body_json(first).await;
    assert_eq!(first["data"]["applied"], true);
    assert_eq!(first["data"]["entry"]["balance_after"], 30);

    let second = post_service(app.clone(), CREDIT_URI, body, Some(TEST_SERVICE_KEY)).await;
    assert_eq!(second.status(), StatusCode::OK);
    let second = body_json(second).await;
    assert_eq!(second["data"]["applied"], false);
    assert_eq!(second["data"]["entry"]["id"], first["data"]["entry"]["id"]);

    let balance = body_json(get_auth(app, "/api/v1/tokens/balance", &token).await).await;
    assert_eq!(balance["data"]["balance"], 30);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_credit_rejects_non_grant_kind(pool: PgPool) {
    let app = common::build_test_app(pool);
    let body = json!({ "user_id": Uuid::new_v4(), "amount": 5, "kind": "usage" });

    let response = post_service(app, CREDIT_URI, body, Some(TEST_SERVICE_KEY)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_credit_rejects_blank_reference(pool: PgPool) {
    let app = common::build_test_app(pool);
    let body = json!({
        "user_id": Uuid::new_v4(),
        "amount": 5,
        "kind": "bonus",
        "reference": "  ",
    });

    let response = post_service(app, CREDIT_URI, body, Some(TEST_SERVICE_KEY)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_credit_requires_service_key(pool: PgPool) {
    let app = common::build_test_app(pool);
    let body = json!({ "user_id": Uuid::new_v4(), "amount": 5, "kind": "bonus" });

    let response = post_service(app, CREDIT_URI, body, Some("guess")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_daily_bonus_pays_each_account_once_per_day(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let token = token_for(Uuid::new_v4());
    get_auth(app.clone(), "/api/v1/tokens/balance", &token).await;

    let engine = fortune_api::state::build_orchestrator(
        &pool,
        common::test_engine_config(),
        StaticCompletion::new(),
        None,
        std::sync::Arc::new(fortune_cache::MemoryCounter::new()),
    );

    assert_eq!(daily_bonus::grant_all(engine.ledger(), 3, "2026-10-16").await, 1);
    assert_eq!(daily_bonus::grant_all(engine.ledger(), 3, "2026-10-16").await, 0);
    assert_eq!(daily_bonus::grant_all(engine.ledger(), 3, "2026-10-17").await, 1);

    let balance = body_json(get_auth(app, "/api/v1/tokens/balance", &token).await).await;
    assert_eq!(balance["data"]["balance"], 16);
}

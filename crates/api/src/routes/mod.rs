pub mod fortunes;
pub mod health;
pub mod internal;
pub mod tokens;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /fortunes/{category}                               get or create (POST)
/// /fortunes/{category}/related                       uncached related categories (GET)
///
/// /tokens/balance                                    balance (GET)
/// /tokens/history                                    transaction history (GET)
///
/// /internal/tokens/credit                            grant tokens (POST, service key)
/// /internal/fortunes/{user_id}/{category}/warm       warm related categories (POST, service key)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/fortunes", fortunes::router())
        .nest("/tokens", tokens::router())
        .nest("/internal", internal::router())
}

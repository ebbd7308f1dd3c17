use axum::routing::post;
use axum::Router;

use crate::handlers::{fortunes, tokens};
use crate::state::AppState;

/// Service-to-service routes mounted at `/internal`. Every handler requires
/// the `x-service-key` header.
///
/// ```text
/// POST   /tokens/credit                          -> credit
/// POST   /fortunes/{user_id}/{category}/warm     -> warm_related
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tokens/credit", post(tokens::credit))
        .route(
            "/fortunes/{user_id}/{category}/warm",
            post(fortunes::warm_related),
        )
}

use axum::routing::get;
use axum::Router;

use crate::handlers::tokens;
use crate::state::AppState;

/// Token routes mounted at `/tokens`.
///
/// ```text
/// GET    /balance    -> get_balance
/// GET    /history    -> get_history
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/balance", get(tokens::get_balance))
        .route("/history", get(tokens::get_history))
}

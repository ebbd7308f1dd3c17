use axum::routing::{get, post};
use axum::Router;

use crate::handlers::fortunes;
use crate::state::AppState;

/// Fortune routes mounted at `/fortunes`.
///
/// ```text
/// POST   /{category}            -> create_fortune
/// GET    /{category}/related    -> related_fortunes
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{category}", post(fortunes::create_fortune))
        .route("/{category}/related", get(fortunes::related_fortunes))
}

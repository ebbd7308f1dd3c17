//! Handlers for fortune retrieval and cache warming.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use fortune_core::profile::UserProfile;
use fortune_core::types::UserId;
use fortune_engine::{FortuneRequest, RejectReason};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::service_key::ServiceKey;
use crate::response::DataResponse;
use crate::state::AppState;

/// Optional body of `POST /fortunes/{category}`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateFortuneBody {
    #[serde(default)]
    pub profile: UserProfile,
    #[serde(default)]
    pub interactive_input: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WarmBody {
    #[serde(default)]
    pub profile: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct RelatedResponse {
    pub category: String,
    /// Related categories with nothing cached yet.
    pub missing: Vec<String>,
}

fn status_for(reason: Option<RejectReason>) -> StatusCode {
    match reason {
        None => StatusCode::OK,
        Some(RejectReason::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
        Some(RejectReason::InsufficientTokens) => StatusCode::PAYMENT_REQUIRED,
    }
}

/// POST /api/v1/fortunes/{category}
///
/// Serve the caller's fortune from cache or generate a new one. The body of
/// a rejection is still a fortune response, with `success: false` and
/// `error_code` set.
pub async fn create_fortune(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(category): Path<String>,
    body: Option<Json<CreateFortuneBody>>,
) -> AppResult<impl IntoResponse> {
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let response = state
        .engine
        .get_or_create_fortune(FortuneRequest {
            user_id: auth.user_id,
            category,
            profile: body.profile,
            interactive_input: body.interactive_input,
        })
        .await?;

    Ok((status_for(response.error_code), Json(response)))
}

/// GET /api/v1/fortunes/{category}/related
pub async fn related_fortunes(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> AppResult<impl IntoResponse> {
    let missing = state.engine.missing_related(auth.user_id, &category).await;
    Ok(Json(DataResponse {
        data: RelatedResponse { category, missing },
    }))
}

/// POST /api/v1/internal/fortunes/{user_id}/{category}/warm
///
/// Pre-generate the user's missing related categories. Not charged.
pub async fn warm_related(
    _service: ServiceKey,
    State(state): State<AppState>,
    Path((user_id, category)): Path<(UserId, String)>,
    body: Option<Json<WarmBody>>,
) -> AppResult<impl IntoResponse> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let report = state
        .engine
        .warm_related(user_id, &category, &body.profile)
        .await?;
    Ok(Json(DataResponse { data: report }))
}

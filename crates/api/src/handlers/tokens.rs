//! Handlers for token balances, history and service-side grants.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use fortune_core::ledger::TransactionKind;
use fortune_core::types::{TokenAmount, UserId};
use fortune_engine::ledger::LedgerEntry;
use fortune_engine::Grant;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::service_key::ServiceKey;
use crate::response::DataResponse;
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

/// Body of `POST /internal/tokens/credit`.
#[derive(Debug, Deserialize)]
pub struct CreditRequest {
    pub user_id: UserId,
    pub amount: TokenAmount,
    /// `purchase` or `bonus`.
    pub kind: TransactionKind,
    /// Idempotency key, e.g. the payment provider's order id.
    pub reference: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreditResponse {
    pub entry: LedgerEntry,
    pub applied: bool,
}

/// GET /api/v1/tokens/balance
pub async fn get_balance(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let welcome_bonus = state.engine.config().welcome_bonus;
    let balance = state.ledger().open_account(auth.user_id, welcome_bonus).await?;
    Ok(Json(DataResponse { data: balance }))
}

/// GET /api/v1/tokens/history?limit=
///
/// Newest first. `limit` defaults to 50 and is clamped to 1..=100.
pub async fn get_history(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> AppResult<impl IntoResponse> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let entries = state.ledger().history(auth.user_id, limit).await?;
    Ok(Json(DataResponse { data: entries }))
}

/// POST /api/v1/internal/tokens/credit
///
/// Grant purchased or bonus tokens. A repeated `reference` returns the
/// original entry with `applied: false`.
pub async fn credit(
    _service: ServiceKey,
    State(state): State<AppState>,
    Json(input): Json<CreditRequest>,
) -> AppResult<impl IntoResponse> {
    if input.reference.as_deref().is_some_and(|r| r.trim().is_empty()) {
        return Err(AppError::BadRequest("reference must not be blank".into()));
    }

    let result = state
        .ledger()
        .credit(Grant {
            user_id: input.user_id,
            amount: input.amount,
            kind: input.kind,
            reference: input.reference,
            description: input.description,
        })
        .await?;

    let status = if result.applied {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(DataResponse {
            data: CreditResponse {
                entry: result.entry,
                applied: result.applied,
            },
        }),
    ))
}

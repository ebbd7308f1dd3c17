//! Fortune and fortune-history models.

use fortune_core::types::{DbId, Timestamp, TokenAmount, UserId};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `fortunes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Fortune {
    pub id: DbId,
    pub user_id: UserId,
    pub category: String,
    pub group_type: String,
    pub input_hash: Option<String>,
    pub payload: serde_json::Value,
    pub source: String,
    pub generated_at: Timestamp,
    pub expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting or superseding a fortune.
#[derive(Debug, Clone)]
pub struct UpsertFortune {
    pub user_id: UserId,
    pub category: String,
    pub group_type: String,
    pub input_hash: Option<String>,
    pub payload: serde_json::Value,
    pub source: String,
    pub generated_at: Timestamp,
    pub expires_at: Option<Timestamp>,
}

/// A row from the `fortune_history` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FortuneHistory {
    pub id: DbId,
    pub user_id: UserId,
    pub category: String,
    pub group_type: String,
    pub payload: serde_json::Value,
    pub token_cost: TokenAmount,
    pub model: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for appending to the history.
#[derive(Debug, Clone)]
pub struct CreateFortuneHistory {
    pub user_id: UserId,
    pub category: String,
    pub group_type: String,
    pub payload: serde_json::Value,
    pub token_cost: TokenAmount,
    pub model: Option<String>,
}

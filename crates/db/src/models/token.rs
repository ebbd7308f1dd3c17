//! Token ledger models.

use fortune_core::types::{DbId, Timestamp, TokenAmount, UserId};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `token_accounts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TokenAccount {
    pub user_id: UserId,
    /// Purchased wallet.
    pub balance: TokenAmount,
    pub quota_limit: TokenAmount,
    pub quota_used: TokenAmount,
    pub quota_period_start: Option<Timestamp>,
    pub is_unlimited: bool,
    pub plan: String,
    pub total_earned: TokenAmount,
    pub total_used: TokenAmount,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `token_transactions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TokenTransaction {
    pub id: DbId,
    pub user_id: UserId,
    pub kind: String,
    /// Sub-balance moved: `wallet`, `quota` or `unlimited`.
    pub source: String,
    pub amount: TokenAmount,
    pub balance_after: TokenAmount,
    pub category: Option<String>,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for a usage debit.
#[derive(Debug, Clone)]
pub struct NewDebit {
    pub user_id: UserId,
    pub amount: TokenAmount,
    pub category: String,
    pub description: Option<String>,
}

/// DTO for a purchase or bonus grant.
#[derive(Debug, Clone)]
pub struct NewCredit {
    pub user_id: UserId,
    pub amount: TokenAmount,
    /// `purchase` or `bonus`.
    pub kind: String,
    /// Idempotency key; a repeated `(user, kind, reference)` is a no-op.
    pub reference: Option<String>,
    pub description: Option<String>,
}

/// DTO for returning a usage debit to the sub-balance it came from.
#[derive(Debug, Clone)]
pub struct NewRefund {
    pub user_id: UserId,
    pub usage_transaction_id: DbId,
    pub source: String,
    pub amount: TokenAmount,
    pub category: Option<String>,
    pub description: Option<String>,
}

/// A row from the `token_usage` analytics table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TokenUsage {
    pub id: DbId,
    pub user_id: UserId,
    pub category: String,
    pub amount: TokenAmount,
    pub source: String,
    pub created_at: Timestamp,
}

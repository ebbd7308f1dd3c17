//! Repository for the `token_accounts` table.
//!
//! Balance mutations live in [`super::TokenLedgerRepo`] so each one is paired
//! with its transaction row. This repository only reads accounts and changes
//! plan/quota settings.

use fortune_core::types::{TokenAmount, UserId};
use sqlx::PgPool;

use crate::models::token::TokenAccount;

/// Column list shared with the ledger repository.
pub(crate) const COLUMNS: &str = "user_id, balance, quota_limit, quota_used, quota_period_start, \
                                  is_unlimited, plan, total_earned, total_used, created_at, updated_at";

pub struct TokenAccountRepo;

impl TokenAccountRepo {
    pub async fn find(pool: &PgPool, user_id: UserId) -> Result<Option<TokenAccount>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM token_accounts WHERE user_id = $1");
        sqlx::query_as::<_, TokenAccount>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Create an empty free account. Returns `true` if a row was inserted.
    pub async fn create_if_missing(pool: &PgPool, user_id: UserId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO token_accounts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All account owners, for periodic grants.
    pub async fn list_user_ids(pool: &PgPool) -> Result<Vec<UserId>, sqlx::Error> {
        let rows: Vec<(UserId,)> =
            sqlx::query_as("SELECT user_id FROM token_accounts ORDER BY created_at")
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Set the plan, unlimited flag and period quota, starting a fresh quota
    /// period. Creates the account if needed.
    pub async fn apply_subscription(
        pool: &PgPool,
        user_id: UserId,
        plan: &str,
        is_unlimited: bool,
        quota_limit: TokenAmount,
    ) -> Result<TokenAccount, sqlx::Error> {
        let query = format!(
            "INSERT INTO token_accounts (user_id, plan, is_unlimited, quota_limit, quota_used, quota_period_start) \
             VALUES ($1, $2, $3, $4, 0, NOW()) \
             ON CONFLICT (user_id) DO UPDATE \
             SET plan = EXCLUDED.plan, \
                 is_unlimited = EXCLUDED.is_unlimited, \
                 quota_limit = EXCLUDED.quota_limit, \
                 quota_used = 0, \
                 quota_period_start = NOW(), \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TokenAccount>(&query)
            .bind(user_id)
            .bind(plan)
            .bind(is_unlimited)
            .bind(quota_limit)
            .fetch_one(pool)
            .await
    }

    /// Start a new quota period. Returns `None` if the account does not exist.
    pub async fn reset_quota_period(
        pool: &PgPool,
        user_id: UserId,
    ) -> Result<Option<TokenAccount>, sqlx::Error> {
        let query = format!(
            "UPDATE token_accounts \
             SET quota_used = 0, quota_period_start = NOW(), updated_at = NOW() \
             WHERE user_id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TokenAccount>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }
}

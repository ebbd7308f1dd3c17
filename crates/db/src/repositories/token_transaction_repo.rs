//! Read access to the append-only `token_transactions` table.

use fortune_core::types::UserId;
use sqlx::PgPool;

use crate::models::token::TokenTransaction;

pub(crate) const COLUMNS: &str = "id, user_id, kind, source, amount, balance_after, category, \
                                  reference, description, created_at";

pub struct TokenTransactionRepo;

impl TokenTransactionRepo {
    /// Newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<TokenTransaction>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM token_transactions \
             WHERE user_id = $1 ORDER BY id DESC LIMIT $2"
        );
        sqlx::query_as::<_, TokenTransaction>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Full log in insertion order, for replay.
    pub async fn list_in_order(
        pool: &PgPool,
        user_id: UserId,
    ) -> Result<Vec<TokenTransaction>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM token_transactions WHERE user_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, TokenTransaction>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }
}

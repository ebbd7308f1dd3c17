//! Repository for the `token_usage` analytics mirror.

use fortune_core::types::{TokenAmount, UserId};
use sqlx::PgPool;

use crate::models::token::TokenUsage;

const COLUMNS: &str = "id, user_id, category, amount, source, created_at";

pub struct TokenUsageRepo;

impl TokenUsageRepo {
    pub async fn record(
        pool: &PgPool,
        user_id: UserId,
        category: &str,
        amount: TokenAmount,
        source: &str,
    ) -> Result<TokenUsage, sqlx::Error> {
        let query = format!(
            "INSERT INTO token_usage (user_id, category, amount, source) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TokenUsage>(&query)
            .bind(user_id)
            .bind(category)
            .bind(amount)
            .bind(source)
            .fetch_one(pool)
            .await
    }
}

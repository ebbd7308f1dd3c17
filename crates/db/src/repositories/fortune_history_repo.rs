//! Repository for the `fortune_history` table.

use fortune_core::types::UserId;
use sqlx::PgPool;

use crate::models::fortune::{CreateFortuneHistory, FortuneHistory};

const COLUMNS: &str = "id, user_id, category, group_type, payload, token_cost, model, created_at";

pub struct FortuneHistoryRepo;

impl FortuneHistoryRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateFortuneHistory,
    ) -> Result<FortuneHistory, sqlx::Error> {
        let query = format!(
            "INSERT INTO fortune_history (user_id, category, group_type, payload, token_cost, model) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FortuneHistory>(&query)
            .bind(input.user_id)
            .bind(&input.category)
            .bind(&input.group_type)
            .bind(&input.payload)
            .bind(input.token_cost)
            .bind(&input.model)
            .fetch_one(pool)
            .await
    }

    /// Most recent entries first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<FortuneHistory>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM fortune_history \
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2"
        );
        sqlx::query_as::<_, FortuneHistory>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}

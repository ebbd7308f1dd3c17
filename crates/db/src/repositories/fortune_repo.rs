//! Repository for the `fortunes` table (the persistent cache tier).

use fortune_core::types::{Timestamp, UserId};
use sqlx::PgPool;

use crate::models::fortune::{Fortune, UpsertFortune};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, category, group_type, input_hash, payload, source, \
                       generated_at, expires_at, created_at, updated_at";

/// Provides lookup, upsert and expiry operations for persisted fortunes.
pub struct FortuneRepo;

impl FortuneRepo {
    /// Find the unexpired fortune for an identity key.
    ///
    /// `input_hash` is compared with `IS NOT DISTINCT FROM` so `None` matches
    /// the non-interactive row.
    pub async fn find_live(
        pool: &PgPool,
        user_id: UserId,
        category: &str,
        input_hash: Option<&str>,
        now: Timestamp,
    ) -> Result<Option<Fortune>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM fortunes \
             WHERE user_id = $1 AND category = $2 AND input_hash IS NOT DISTINCT FROM $3 \
               AND (expires_at IS NULL OR expires_at > $4)"
        );
        sqlx::query_as::<_, Fortune>(&query)
            .bind(user_id)
            .bind(category)
            .bind(input_hash)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Insert a fortune, superseding any existing row for the same identity.
    pub async fn upsert(pool: &PgPool, input: &UpsertFortune) -> Result<Fortune, sqlx::Error> {
        let query = format!(
            "INSERT INTO fortunes \
                (user_id, category, group_type, input_hash, payload, source, generated_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT ON CONSTRAINT uq_fortunes_identity DO UPDATE \
             SET group_type = EXCLUDED.group_type, \
                 payload = EXCLUDED.payload, \
                 source = EXCLUDED.source, \
                 generated_at = EXCLUDED.generated_at, \
                 expires_at = EXCLUDED.expires_at, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Fortune>(&query)
            .bind(input.user_id)
            .bind(&input.category)
            .bind(&input.group_type)
            .bind(&input.input_hash)
            .bind(&input.payload)
            .bind(&input.source)
            .bind(input.generated_at)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Expire a user's live fortunes, optionally limited to one category.
    /// Rows are kept; only `expires_at` moves. Returns the affected count.
    pub async fn expire_for_user(
        pool: &PgPool,
        user_id: UserId,
        category: Option<&str>,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE fortunes SET expires_at = $3, updated_at = NOW() \
             WHERE user_id = $1 AND ($2::TEXT IS NULL OR category = $2) \
               AND (expires_at IS NULL OR expires_at > $3)",
        )
        .bind(user_id)
        .bind(category)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Of `categories`, return those with a live non-interactive fortune.
    pub async fn live_categories(
        pool: &PgPool,
        user_id: UserId,
        categories: &[String],
        now: Timestamp,
    ) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT category FROM fortunes \
             WHERE user_id = $1 AND category = ANY($2) AND input_hash IS NULL \
               AND (expires_at IS NULL OR expires_at > $3)",
        )
        .bind(user_id)
        .bind(categories)
        .bind(now)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(c,)| c).collect())
    }

    /// Hard-delete fortunes that expired before `cutoff`. Returns the count.
    pub async fn purge_expired_before(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM fortunes WHERE expires_at IS NOT NULL AND expires_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

//! PostgreSQL adapters for the store ports.

use async_trait::async_trait;
use fortune_core::category::CategoryGroup;
use fortune_core::ledger::{DebitSource, Plan, TransactionKind};
use fortune_core::types::{Timestamp, TokenAmount, UserId};
use fortune_db::models::fortune::{CreateFortuneHistory, Fortune, UpsertFortune};
use fortune_db::models::token::{NewCredit, NewDebit, NewRefund, TokenAccount, TokenTransaction};
use fortune_db::repositories::{
    DebitOutcome, FortuneHistoryRepo, FortuneRepo, TokenAccountRepo, TokenLedgerRepo,
    TokenTransactionRepo, TokenUsageRepo,
};
use fortune_db::DbPool;

use crate::ledger::{AccountSnapshot, CreditResult, DebitResult, Grant, LedgerEntry, Reservation};
use crate::ports::{FortuneStore, HistoryEntry, LedgerStore, StoreError};
use crate::resolver::{CachedFortune, FortuneKey};

/// `source` column value for generated content.
const FRESH_SOURCE: &str = "fresh";

// ---------------------------------------------------------------------------
// Fortunes
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgFortuneStore {
    pool: DbPool,
}

impl PgFortuneStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn cached_from_row(row: Fortune) -> Result<CachedFortune, StoreError> {
    let group = CategoryGroup::from_name(&row.group_type).map_err(|e| StoreError(e.to_string()))?;
    Ok(CachedFortune {
        payload: row.payload,
        group,
        generated_at: row.generated_at,
        expires_at: row.expires_at,
    })
}

#[async_trait]
impl FortuneStore for PgFortuneStore {
    async fn find_live(
        &self,
        key: &FortuneKey,
        now: Timestamp,
    ) -> Result<Option<CachedFortune>, StoreError> {
        FortuneRepo::find_live(
            &self.pool,
            key.user_id,
            &key.category,
            key.input_hash.as_deref(),
            now,
        )
        .await?
        .map(cached_from_row)
        .transpose()
    }

    async fn upsert(&self, key: &FortuneKey, entry: &CachedFortune) -> Result<(), StoreError> {
        let input = UpsertFortune {
            user_id: key.user_id,
            category: key.category.clone(),
            group_type: entry.group.as_str().to_string(),
            input_hash: key.input_hash.clone(),
            payload: entry.payload.clone(),
            source: FRESH_SOURCE.to_string(),
            generated_at: entry.generated_at,
            expires_at: entry.expires_at,
        };
        FortuneRepo::upsert(&self.pool, &input).await?;
        Ok(())
    }

    async fn expire_for_user(
        &self,
        user_id: UserId,
        category: Option<&str>,
        now: Timestamp,
    ) -> Result<u64, StoreError> {
        Ok(FortuneRepo::expire_for_user(&self.pool, user_id, category, now).await?)
    }

    async fn live_categories(
        &self,
        user_id: UserId,
        categories: &[String],
        now: Timestamp,
    ) -> Result<Vec<String>, StoreError> {
        Ok(FortuneRepo::live_categories(&self.pool, user_id, categories, now).await?)
    }

    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), StoreError> {
        let input = CreateFortuneHistory {
            user_id: entry.user_id,
            category: entry.category.clone(),
            group_type: entry.group.as_str().to_string(),
            payload: entry.payload.clone(),
            token_cost: entry.token_cost,
            model: entry.model.clone(),
        };
        FortuneHistoryRepo::create(&self.pool, &input).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgLedgerStore {
    pool: DbPool,
}

impl PgLedgerStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn snapshot_from_row(row: TokenAccount) -> Result<AccountSnapshot, StoreError> {
    Ok(AccountSnapshot {
        user_id: row.user_id,
        wallet: row.balance,
        quota_limit: row.quota_limit,
        quota_used: row.quota_used,
        is_unlimited: row.is_unlimited,
        plan: Plan::from_name(&row.plan).map_err(|e| StoreError(e.to_string()))?,
    })
}

fn entry_from_row(row: TokenTransaction) -> Result<LedgerEntry, StoreError> {
    Ok(LedgerEntry {
        id: row.id,
        user_id: row.user_id,
        kind: TransactionKind::from_name(&row.kind).map_err(|e| StoreError(e.to_string()))?,
        source: DebitSource::from_name(&row.source).map_err(|e| StoreError(e.to_string()))?,
        amount: row.amount,
        balance_after: row.balance_after,
        category: row.category,
        reference: row.reference,
        description: row.description,
        created_at: row.created_at,
    })
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn account(&self, user_id: UserId) -> Result<Option<AccountSnapshot>, StoreError> {
        TokenAccountRepo::find(&self.pool, user_id)
            .await?
            .map(snapshot_from_row)
            .transpose()
    }

    async fn open_account(&self, user_id: UserId) -> Result<bool, StoreError> {
        Ok(TokenAccountRepo::create_if_missing(&self.pool, user_id).await?)
    }

    async fn debit(
        &self,
        user_id: UserId,
        amount: TokenAmount,
        category: &str,
    ) -> Result<DebitResult, StoreError> {
        let input = NewDebit {
            user_id,
            amount,
            category: category.to_string(),
            description: Some(format!("{category} fortune")),
        };
        match TokenLedgerRepo::debit(&self.pool, &input).await? {
            DebitOutcome::Debited(row) => Ok(DebitResult::Debited(entry_from_row(row)?)),
            DebitOutcome::Insufficient { available } => Ok(DebitResult::Insufficient { available }),
        }
    }

    async fn refund(
        &self,
        reservation: &Reservation,
        reason: &str,
    ) -> Result<LedgerEntry, StoreError> {
        let input = NewRefund {
            user_id: reservation.user_id,
            usage_transaction_id: reservation.usage_entry_id,
            source: reservation.source.as_str().to_string(),
            amount: reservation.amount,
            category: Some(reservation.category.clone()),
            description: Some(reason.to_string()),
        };
        entry_from_row(TokenLedgerRepo::refund(&self.pool, &input).await?)
    }

    async fn credit(&self, grant: &Grant) -> Result<CreditResult, StoreError> {
        let input = NewCredit {
            user_id: grant.user_id,
            amount: grant.amount,
            kind: grant.kind.as_str().to_string(),
            reference: grant.reference.clone(),
            description: grant.description.clone(),
        };
        let outcome = TokenLedgerRepo::credit(&self.pool, &input).await?;
        Ok(CreditResult {
            entry: entry_from_row(outcome.transaction)?,
            applied: outcome.applied,
        })
    }

    async fn record_usage(&self, reservation: &Reservation) -> Result<(), StoreError> {
        TokenUsageRepo::record(
            &self.pool,
            reservation.user_id,
            &reservation.category,
            reservation.amount,
            reservation.source.as_str(),
        )
        .await?;
        Ok(())
    }

    async fn apply_subscription(
        &self,
        user_id: UserId,
        plan: Plan,
        period_quota: TokenAmount,
    ) -> Result<AccountSnapshot, StoreError> {
        let row = TokenAccountRepo::apply_subscription(
            &self.pool,
            user_id,
            plan.as_str(),
            plan.is_unlimited(),
            period_quota,
        )
        .await?;
        snapshot_from_row(row)
    }

    async fn reset_quota_period(
        &self,
        user_id: UserId,
    ) -> Result<Option<AccountSnapshot>, StoreError> {
        TokenAccountRepo::reset_quota_period(&self.pool, user_id)
            .await?
            .map(snapshot_from_row)
            .transpose()
    }

    async fn history(&self, user_id: UserId, limit: i64) -> Result<Vec<LedgerEntry>, StoreError> {
        TokenTransactionRepo::list_for_user(&self.pool, user_id, limit)
            .await?
            .into_iter()
            .map(entry_from_row)
            .collect()
    }

    async fn user_ids(&self) -> Result<Vec<UserId>, StoreError> {
        Ok(TokenAccountRepo::list_user_ids(&self.pool).await?)
    }
}

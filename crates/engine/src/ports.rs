//! Store ports the engine depends on.
//!
//! Production wiring uses the PostgreSQL adapters in [`crate::pg`]; tests
//! substitute in-memory implementations.

use async_trait::async_trait;
use fortune_core::ledger::Plan;
use fortune_core::types::{Timestamp, TokenAmount, UserId};

use crate::ledger::{AccountSnapshot, CreditResult, DebitResult, Grant, LedgerEntry, Reservation};
use crate::resolver::{CachedFortune, FortuneKey};

/// Failure inside a store adapter.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self(err.to_string())
    }
}

/// A fresh generation appended to the permanent history.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub user_id: UserId,
    pub category: String,
    pub group: fortune_core::category::CategoryGroup,
    pub payload: serde_json::Value,
    pub token_cost: TokenAmount,
    pub model: Option<String>,
}

/// The persistent fortune tier.
#[async_trait]
pub trait FortuneStore: Send + Sync {
    /// The unexpired record for `key`, if any.
    async fn find_live(
        &self,
        key: &FortuneKey,
        now: Timestamp,
    ) -> Result<Option<CachedFortune>, StoreError>;

    /// Insert or supersede the record for `key`.
    async fn upsert(&self, key: &FortuneKey, entry: &CachedFortune) -> Result<(), StoreError>;

    /// Expire (never delete) a user's records, optionally for one category.
    async fn expire_for_user(
        &self,
        user_id: UserId,
        category: Option<&str>,
        now: Timestamp,
    ) -> Result<u64, StoreError>;

    /// Of `categories`, those with a live non-interactive record.
    async fn live_categories(
        &self,
        user_id: UserId,
        categories: &[String],
        now: Timestamp,
    ) -> Result<Vec<String>, StoreError>;

    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), StoreError>;
}

/// The durable token ledger. Every mutation is atomic with its
/// transaction row.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn account(&self, user_id: UserId) -> Result<Option<AccountSnapshot>, StoreError>;

    /// Create an empty free account. Returns `true` if one was created.
    async fn open_account(&self, user_id: UserId) -> Result<bool, StoreError>;

    /// Debit `amount` from the first sub-balance that covers it.
    async fn debit(
        &self,
        user_id: UserId,
        amount: TokenAmount,
        category: &str,
    ) -> Result<DebitResult, StoreError>;

    /// Return a reservation to the sub-balance it came from. Idempotent per
    /// reservation.
    async fn refund(&self, reservation: &Reservation, reason: &str)
        -> Result<LedgerEntry, StoreError>;

    /// Grant tokens to the wallet. Idempotent on `(user, kind, reference)`.
    async fn credit(&self, grant: &Grant) -> Result<CreditResult, StoreError>;

    /// Mirror a committed charge into the analytics table.
    async fn record_usage(&self, reservation: &Reservation) -> Result<(), StoreError>;

    async fn apply_subscription(
        &self,
        user_id: UserId,
        plan: Plan,
        period_quota: TokenAmount,
    ) -> Result<AccountSnapshot, StoreError>;

    async fn reset_quota_period(&self, user_id: UserId)
        -> Result<Option<AccountSnapshot>, StoreError>;

    /// Newest first.
    async fn history(&self, user_id: UserId, limit: i64) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Every account owner, for periodic grants.
    async fn user_ids(&self) -> Result<Vec<UserId>, StoreError>;
}

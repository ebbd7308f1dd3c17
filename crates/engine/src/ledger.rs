//! Token ledger service.
//!
//! Wraps a [`LedgerStore`] with the engine's failure policy: a failed charge
//! or refund is [`EngineError::LedgerWriteFailed`]; the usage mirror written
//! on commit is best-effort.

use std::sync::Arc;

use fortune_core::ledger::{
    display_balance, quota_remaining, DebitSource, Plan, TransactionKind, WELCOME_REFERENCE,
};
use fortune_core::types::{DbId, Timestamp, TokenAmount, UserId};
use serde::Serialize;

use crate::error::EngineError;
use crate::ports::LedgerStore;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Account state as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub user_id: UserId,
    pub wallet: TokenAmount,
    pub quota_limit: TokenAmount,
    pub quota_used: TokenAmount,
    pub is_unlimited: bool,
    pub plan: Plan,
}

/// One row of the append-only log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub id: DbId,
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub source: DebitSource,
    pub amount: TokenAmount,
    pub balance_after: TokenAmount,
    pub category: Option<String>,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone)]
pub enum DebitResult {
    Debited(LedgerEntry),
    Insufficient { available: TokenAmount },
}

/// A purchase or bonus to credit.
#[derive(Debug, Clone)]
pub struct Grant {
    pub user_id: UserId,
    pub amount: TokenAmount,
    pub kind: TransactionKind,
    pub reference: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreditResult {
    pub entry: LedgerEntry,
    /// `false` when the reference had already been credited.
    pub applied: bool,
}

/// Tokens held for one in-flight generation. Already debited and recorded;
/// settled by [`TokenLedger::commit`] or [`TokenLedger::refund`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub user_id: UserId,
    pub category: String,
    pub amount: TokenAmount,
    pub source: DebitSource,
    /// Id of the `usage` row written by the debit.
    pub usage_entry_id: DbId,
}

#[derive(Debug, Clone)]
pub enum ReserveOutcome {
    Reserved(Reservation),
    Insufficient {
        required: TokenAmount,
        available: TokenAmount,
    },
}

/// Balance as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceView {
    /// Display balance: wallet plus remaining quota, or the unlimited marker.
    pub balance: TokenAmount,
    pub wallet: TokenAmount,
    pub quota_remaining: TokenAmount,
    pub is_unlimited: bool,
    pub plan: Plan,
}

impl BalanceView {
    fn empty() -> Self {
        Self {
            balance: 0,
            wallet: 0,
            quota_remaining: 0,
            is_unlimited: false,
            plan: Plan::Free,
        }
    }
}

impl From<&AccountSnapshot> for BalanceView {
    fn from(account: &AccountSnapshot) -> Self {
        let quota = quota_remaining(account.quota_limit, account.quota_used);
        Self {
            balance: display_balance(account.is_unlimited, account.wallet, quota),
            wallet: account.wallet,
            quota_remaining: quota,
            is_unlimited: account.is_unlimited,
            plan: account.plan,
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct TokenLedger {
    store: Arc<dyn LedgerStore>,
}

impl TokenLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Current balance. A missing account reads as an empty free account.
    pub async fn get_balance(&self, user_id: UserId) -> Result<BalanceView, EngineError> {
        let account = self
            .store
            .account(user_id)
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        Ok(account.as_ref().map(BalanceView::from).unwrap_or_else(BalanceView::empty))
    }

    /// Debit `amount` for `category`, or report why it cannot be covered.
    pub async fn reserve(
        &self,
        user_id: UserId,
        amount: TokenAmount,
        category: &str,
    ) -> Result<ReserveOutcome, EngineError> {
        if amount < 0 {
            return Err(EngineError::InvalidInput(format!(
                "reservation amount must not be negative, got {amount}"
            )));
        }

        match self.store.debit(user_id, amount, category).await {
            Ok(DebitResult::Debited(entry)) => {
                tracing::debug!(%user_id, category, amount, source = entry.source.as_str(), "Tokens reserved");
                Ok(ReserveOutcome::Reserved(Reservation {
                    user_id,
                    category: category.to_string(),
                    // Unlimited accounts are debited zero.
                    amount: entry.amount.abs(),
                    source: entry.source,
                    usage_entry_id: entry.id,
                }))
            }
            Ok(DebitResult::Insufficient { available }) => Ok(ReserveOutcome::Insufficient {
                required: amount,
                available,
            }),
            Err(e) => {
                tracing::error!(%user_id, category, amount, error = %e, "Token reservation failed");
                Err(EngineError::LedgerWriteFailed(e.to_string()))
            }
        }
    }

    /// Finalise a reservation. The debit is already durable; this only
    /// writes the analytics mirror, so failures are logged and swallowed.
    pub async fn commit(&self, reservation: &Reservation) {
        if let Err(e) = self.store.record_usage(reservation).await {
            tracing::warn!(
                user_id = %reservation.user_id,
                category = %reservation.category,
                error = %e,
                "Failed to record token usage"
            );
        }
    }

    /// Return a reservation in full.
    pub async fn refund(
        &self,
        reservation: Reservation,
        reason: &str,
    ) -> Result<LedgerEntry, EngineError> {
        match self.store.refund(&reservation, reason).await {
            Ok(entry) => {
                tracing::info!(
                    user_id = %reservation.user_id,
                    category = %reservation.category,
                    amount = reservation.amount,
                    reason,
                    "Reservation refunded"
                );
                Ok(entry)
            }
            Err(e) => {
                tracing::error!(
                    user_id = %reservation.user_id,
                    category = %reservation.category,
                    amount = reservation.amount,
                    error = %e,
                    "Refund failed"
                );
                Err(EngineError::LedgerWriteFailed(e.to_string()))
            }
        }
    }

    /// Grant a purchase or bonus.
    pub async fn credit(&self, grant: Grant) -> Result<CreditResult, EngineError> {
        if grant.amount <= 0 {
            return Err(EngineError::InvalidInput(format!(
                "credit amount must be positive, got {}",
                grant.amount
            )));
        }
        if !grant.kind.is_grant() {
            return Err(EngineError::InvalidInput(format!(
                "'{}' cannot be credited",
                grant.kind.as_str()
            )));
        }

        let result = self
            .store
            .credit(&grant)
            .await
            .map_err(|e| EngineError::LedgerWriteFailed(e.to_string()))?;
        if result.applied {
            tracing::info!(
                user_id = %grant.user_id,
                amount = grant.amount,
                kind = grant.kind.as_str(),
                "Tokens credited"
            );
        }
        Ok(result)
    }

    /// Ensure the account exists and holds its welcome bonus.
    ///
    /// The bonus is keyed on `(user, bonus, "welcome")`, so it is attempted on
    /// every call and applied once. A failed grant is retried by the next
    /// call instead of being lost once the account row exists.
    pub async fn open_account(
        &self,
        user_id: UserId,
        welcome_bonus: TokenAmount,
    ) -> Result<BalanceView, EngineError> {
        let created = self
            .store
            .open_account(user_id)
            .await
            .map_err(|e| EngineError::LedgerWriteFailed(e.to_string()))?;
        if created {
            tracing::debug!(user_id = %user_id, "Token account opened");
        }

        if welcome_bonus > 0 {
            self.credit(Grant {
                user_id,
                amount: welcome_bonus,
                kind: TransactionKind::Bonus,
                reference: Some(WELCOME_REFERENCE.to_string()),
                description: Some("Welcome bonus".to_string()),
            })
            .await?;
        }

        self.get_balance(user_id).await
    }

    /// Set a subscription plan and its per-period quota.
    pub async fn apply_subscription(
        &self,
        user_id: UserId,
        plan: Plan,
        period_quota: TokenAmount,
    ) -> Result<BalanceView, EngineError> {
        if period_quota < 0 {
            return Err(EngineError::InvalidInput("period quota must not be negative".into()));
        }
        let account = self
            .store
            .apply_subscription(user_id, plan, period_quota)
            .await
            .map_err(|e| EngineError::LedgerWriteFailed(e.to_string()))?;
        Ok(BalanceView::from(&account))
    }

    /// Start a new quota period. `None` if the account does not exist.
    pub async fn reset_quota_period(
        &self,
        user_id: UserId,
    ) -> Result<Option<BalanceView>, EngineError> {
        let account = self
            .store
            .reset_quota_period(user_id)
            .await
            .map_err(|e| EngineError::LedgerWriteFailed(e.to_string()))?;
        Ok(account.as_ref().map(BalanceView::from))
    }

    /// Transactions, newest first.
    pub async fn history(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, EngineError> {
        self.store
            .history(user_id, limit)
            .await
            .map_err(|e| EngineError::Store(e.to_string()))
    }

    pub async fn user_ids(&self) -> Result<Vec<UserId>, EngineError> {
        self.store
            .user_ids()
            .await
            .map_err(|e| EngineError::Store(e.to_string()))
    }
}

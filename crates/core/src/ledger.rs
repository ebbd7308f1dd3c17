//! Sub-balance rules shared by the ledger service and its stores.
//!
//! An account holds a purchased wallet, an optional periodic quota (basic
//! plan) and an unlimited flag (premium plans). Every transaction targets
//! exactly one of those, recorded as its [`DebitSource`].

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::TokenAmount;

/// Balance reported for unlimited accounts.
pub const UNLIMITED_DISPLAY_BALANCE: TokenAmount = 999_999;

/// Tokens granted once when an account is opened.
pub const WELCOME_BONUS: TokenAmount = 10;

/// Reference recorded on the welcome bonus.
pub const WELCOME_REFERENCE: &str = "welcome";

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Basic,
    Premium,
    Enterprise,
}

impl Plan {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Premium => "premium",
            Self::Enterprise => "enterprise",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "free" => Ok(Self::Free),
            "basic" => Ok(Self::Basic),
            "premium" => Ok(Self::Premium),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(CoreError::Validation(format!("Unknown plan '{other}'"))),
        }
    }

    pub fn is_unlimited(self) -> bool {
        matches!(self, Self::Premium | Self::Enterprise)
    }
}

// ---------------------------------------------------------------------------
// Transaction kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Usage,
    Purchase,
    Bonus,
    Refund,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Usage => "usage",
            Self::Purchase => "purchase",
            Self::Bonus => "bonus",
            Self::Refund => "refund",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "usage" => Ok(Self::Usage),
            "purchase" => Ok(Self::Purchase),
            "bonus" => Ok(Self::Bonus),
            "refund" => Ok(Self::Refund),
            other => Err(CoreError::Validation(format!(
                "Unknown transaction kind '{other}'"
            ))),
        }
    }

    /// Kinds that may be granted through `credit`.
    pub fn is_grant(self) -> bool {
        matches!(self, Self::Purchase | Self::Bonus)
    }
}

// ---------------------------------------------------------------------------
// Debit source
// ---------------------------------------------------------------------------

/// Sub-balance a transaction moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebitSource {
    Wallet,
    Quota,
    Unlimited,
}

impl DebitSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wallet => "wallet",
            Self::Quota => "quota",
            Self::Unlimited => "unlimited",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "wallet" => Ok(Self::Wallet),
            "quota" => Ok(Self::Quota),
            "unlimited" => Ok(Self::Unlimited),
            other => Err(CoreError::Validation(format!("Unknown debit source '{other}'"))),
        }
    }
}

/// Pick the sub-balance that pays `amount`, or `None` when nothing covers it.
///
/// Quota is spent before the wallet. A single debit never splits across
/// sub-balances.
pub fn choose_debit_source(
    is_unlimited: bool,
    wallet: TokenAmount,
    quota_remaining: TokenAmount,
    amount: TokenAmount,
) -> Option<DebitSource> {
    if is_unlimited {
        Some(DebitSource::Unlimited)
    } else if quota_remaining >= amount {
        Some(DebitSource::Quota)
    } else if wallet >= amount {
        Some(DebitSource::Wallet)
    } else {
        None
    }
}

/// Remaining periodic quota, never negative.
pub fn quota_remaining(quota_limit: TokenAmount, quota_used: TokenAmount) -> TokenAmount {
    (quota_limit - quota_used).max(0)
}

/// Balance shown to the user.
pub fn display_balance(
    is_unlimited: bool,
    wallet: TokenAmount,
    quota_remaining: TokenAmount,
) -> TokenAmount {
    if is_unlimited {
        UNLIMITED_DISPLAY_BALANCE
    } else {
        wallet + quota_remaining
    }
}

/// Replay a transaction log (oldest first) and return the wallet balance it
/// implies. Must equal the stored wallet for every account.
pub fn replay_wallet<I>(transactions: I) -> TokenAmount
where
    I: IntoIterator<Item = (DebitSource, TokenAmount)>,
{
    transactions
        .into_iter()
        .filter(|(source, _)| *source == DebitSource::Wallet)
        .map(|(_, amount)| amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_always_wins() {
        assert_eq!(
            choose_debit_source(true, 0, 0, 100),
            Some(DebitSource::Unlimited)
        );
    }

    #[test]
    fn quota_is_spent_before_wallet() {
        assert_eq!(choose_debit_source(false, 50, 3, 3), Some(DebitSource::Quota));
        assert_eq!(choose_debit_source(false, 50, 2, 3), Some(DebitSource::Wallet));
    }

    #[test]
    fn debit_never_splits() {
        // 2 quota + 2 wallet would cover 3, but a debit uses one sub-balance.
        assert_eq!(choose_debit_source(false, 2, 2, 3), None);
    }

    #[test]
    fn zero_cost_is_always_covered() {
        assert_eq!(choose_debit_source(false, 0, 0, 0), Some(DebitSource::Quota));
    }

    #[test]
    fn display_balance_rules() {
        assert_eq!(display_balance(true, 3, 0), UNLIMITED_DISPLAY_BALANCE);
        assert_eq!(display_balance(false, 3, 4), 7);
        assert_eq!(quota_remaining(10, 12), 0);
    }

    #[test]
    fn replay_only_counts_wallet_rows() {
        let log = [
            (DebitSource::Wallet, 10),
            (DebitSource::Wallet, -3),
            (DebitSource::Quota, -1),
            (DebitSource::Unlimited, 0),
            (DebitSource::Wallet, 3),
        ];
        assert_eq!(replay_wallet(log), 10);
    }

    #[test]
    fn names_round_trip() {
        for plan in [Plan::Free, Plan::Basic, Plan::Premium, Plan::Enterprise] {
            assert_eq!(Plan::from_name(plan.as_str()).unwrap(), plan);
        }
        for kind in [
            TransactionKind::Usage,
            TransactionKind::Purchase,
            TransactionKind::Bonus,
            TransactionKind::Refund,
        ] {
            assert_eq!(TransactionKind::from_name(kind.as_str()).unwrap(), kind);
        }
        assert!(DebitSource::from_name("credit-card").is_err());
        assert!(Plan::Premium.is_unlimited());
        assert!(!Plan::Basic.is_unlimited());
    }
}

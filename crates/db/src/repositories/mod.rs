//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod fortune_history_repo;
pub mod fortune_repo;
pub mod token_account_repo;
pub mod token_ledger_repo;
pub mod token_transaction_repo;
pub mod token_usage_repo;

pub use fortune_history_repo::FortuneHistoryRepo;
pub use fortune_repo::FortuneRepo;
pub use token_account_repo::TokenAccountRepo;
pub use token_ledger_repo::{CreditOutcome, DebitOutcome, TokenLedgerRepo};
pub use token_transaction_repo::TokenTransactionRepo;
pub use token_usage_repo::TokenUsageRepo;

//! Atomic balance mutations.
//!
//! Every operation here runs in one database transaction: lock the account
//! row (`FOR UPDATE`), apply a conditional update to exactly one
//! sub-balance, append the matching `token_transactions` row, commit. The
//! wallet column therefore always equals the replay of the wallet rows.

use fortune_core::ledger::{
    choose_debit_source, display_balance, quota_remaining, DebitSource,
};
use fortune_core::types::{TokenAmount, UserId};
use sqlx::{PgConnection, PgPool};

use super::token_account_repo::COLUMNS as ACCOUNT_COLUMNS;
use super::token_transaction_repo::COLUMNS as TX_COLUMNS;
use crate::models::token::{NewCredit, NewDebit, NewRefund, TokenAccount, TokenTransaction};

/// Result of [`TokenLedgerRepo::debit`].
#[derive(Debug, Clone)]
pub enum DebitOutcome {
    /// The debit was applied; the usage row is returned.
    Debited(TokenTransaction),
    /// Nothing covers the amount. `available` is the display balance.
    Insufficient { available: TokenAmount },
}

/// Result of [`TokenLedgerRepo::credit`].
#[derive(Debug, Clone)]
pub struct CreditOutcome {
    pub transaction: TokenTransaction,
    /// `false` when the reference had already been credited.
    pub applied: bool,
}

pub struct TokenLedgerRepo;

impl TokenLedgerRepo {
    /// Debit `input.amount` from the first sub-balance that covers it and
    /// append a `usage` row. Unlimited accounts record a zero-amount usage.
    pub async fn debit(pool: &PgPool, input: &NewDebit) -> Result<DebitOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(account) = lock_account(&mut tx, input.user_id).await? else {
            tx.rollback().await?;
            return Ok(DebitOutcome::Insufficient { available: 0 });
        };

        let remaining = quota_remaining(account.quota_limit, account.quota_used);
        let Some(source) =
            choose_debit_source(account.is_unlimited, account.balance, remaining, input.amount)
        else {
            tx.rollback().await?;
            return Ok(DebitOutcome::Insufficient {
                available: display_balance(account.is_unlimited, account.balance, remaining),
            });
        };

        let (recorded, balance_after) = match source {
            DebitSource::Wallet => {
                let (after,): (TokenAmount,) = sqlx::query_as(
                    "UPDATE token_accounts \
                     SET balance = balance - $2, total_used = total_used + $2, updated_at = NOW() \
                     WHERE user_id = $1 AND balance >= $2 \
                     RETURNING balance",
                )
                .bind(input.user_id)
                .bind(input.amount)
                .fetch_one(&mut *tx)
                .await?;
                (-input.amount, after)
            }
            DebitSource::Quota => {
                let (after,): (TokenAmount,) = sqlx::query_as(
                    "UPDATE token_accounts \
                     SET quota_used = quota_used + $2, total_used = total_used + $2, updated_at = NOW() \
                     WHERE user_id = $1 AND quota_limit - quota_used >= $2 \
                     RETURNING quota_limit - quota_used",
                )
                .bind(input.user_id)
                .bind(input.amount)
                .fetch_one(&mut *tx)
                .await?;
                (-input.amount, after)
            }
            DebitSource::Unlimited => (0, account.balance),
        };

        let transaction = insert_transaction(
            &mut tx,
            &TxRow {
                user_id: input.user_id,
                kind: "usage",
                source,
                amount: recorded,
                balance_after,
                category: Some(&input.category),
                reference: None,
                description: input.description.as_deref(),
            },
        )
        .await?;

        tx.commit().await?;
        Ok(DebitOutcome::Debited(transaction))
    }

    /// Return a usage debit to the sub-balance it came from.
    ///
    /// Idempotent: the refund row carries reference `refund:{usage id}`, and a
    /// second call returns the existing row without touching the balance.
    pub async fn refund(pool: &PgPool, input: &NewRefund) -> Result<TokenTransaction, sqlx::Error> {
        let source = DebitSource::from_name(&input.source)
            .map_err(|e| sqlx::Error::Decode(e.to_string().into()))?;
        let reference = format!("refund:{}", input.usage_transaction_id);

        let mut tx = pool.begin().await?;

        let account = lock_account(&mut tx, input.user_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        if let Some(existing) = find_by_reference(&mut tx, input.user_id, "refund", &reference).await? {
            tx.rollback().await?;
            return Ok(existing);
        }

        let (recorded, balance_after) = match source {
            DebitSource::Wallet => {
                let (after,): (TokenAmount,) = sqlx::query_as(
                    "UPDATE token_accounts \
                     SET balance = balance + $2, total_used = GREATEST(total_used - $2, 0), updated_at = NOW() \
                     WHERE user_id = $1 \
                     RETURNING balance",
                )
                .bind(input.user_id)
                .bind(input.amount)
                .fetch_one(&mut *tx)
                .await?;
                (input.amount, after)
            }
            DebitSource::Quota => {
                let (after,): (TokenAmount,) = sqlx::query_as(
                    "UPDATE token_accounts \
                     SET quota_used = GREATEST(quota_used - $2, 0), \
                         total_used = GREATEST(total_used - $2, 0), updated_at = NOW() \
                     WHERE user_id = $1 \
                     RETURNING GREATEST(quota_limit - quota_used, 0)",
                )
                .bind(input.user_id)
                .bind(input.amount)
                .fetch_one(&mut *tx)
                .await?;
                (input.amount, after)
            }
            DebitSource::Unlimited => (0, account.balance),
        };

        let transaction = insert_transaction(
            &mut tx,
            &TxRow {
                user_id: input.user_id,
                kind: "refund",
                source,
                amount: recorded,
                balance_after,
                category: input.category.as_deref(),
                reference: Some(&reference),
                description: input.description.as_deref(),
            },
        )
        .await?;

        tx.commit().await?;
        Ok(transaction)
    }

    /// Grant tokens to the wallet, creating the account if needed.
    ///
    /// Idempotent on `(user, kind, reference)` when a reference is given.
    pub async fn credit(pool: &PgPool, input: &NewCredit) -> Result<CreditOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("INSERT INTO token_accounts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(input.user_id)
            .execute(&mut *tx)
            .await?;
        lock_account(&mut tx, input.user_id).await?;

        if let Some(reference) = input.reference.as_deref() {
            if let Some(existing) =
                find_by_reference(&mut tx, input.user_id, &input.kind, reference).await?
            {
                tx.rollback().await?;
                return Ok(CreditOutcome {
                    transaction: existing,
                    applied: false,
                });
            }
        }

        let (after,): (TokenAmount,) = sqlx::query_as(
            "UPDATE token_accounts \
             SET balance = balance + $2, total_earned = total_earned + $2, updated_at = NOW() \
             WHERE user_id = $1 \
             RETURNING balance",
        )
        .bind(input.user_id)
        .bind(input.amount)
        .fetch_one(&mut *tx)
        .await?;

        let transaction = insert_transaction(
            &mut tx,
            &TxRow {
                user_id: input.user_id,
                kind: &input.kind,
                source: DebitSource::Wallet,
                amount: input.amount,
                balance_after: after,
                category: None,
                reference: input.reference.as_deref(),
                description: input.description.as_deref(),
            },
        )
        .await?;

        tx.commit().await?;
        Ok(CreditOutcome {
            transaction,
            applied: true,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct TxRow<'a> {
    user_id: UserId,
    kind: &'a str,
    source: DebitSource,
    amount: TokenAmount,
    balance_after: TokenAmount,
    category: Option<&'a str>,
    reference: Option<&'a str>,
    description: Option<&'a str>,
}

async fn lock_account(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Option<TokenAccount>, sqlx::Error> {
    let query = format!("SELECT {ACCOUNT_COLUMNS} FROM token_accounts WHERE user_id = $1 FOR UPDATE");
    sqlx::query_as::<_, TokenAccount>(&query)
        .bind(user_id)
        .fetch_optional(conn)
        .await
}

async fn find_by_reference(
    conn: &mut PgConnection,
    user_id: UserId,
    kind: &str,
    reference: &str,
) -> Result<Option<TokenTransaction>, sqlx::Error> {
    let query = format!(
        "SELECT {TX_COLUMNS} FROM token_transactions \
         WHERE user_id = $1 AND kind = $2 AND reference = $3"
    );
    sqlx::query_as::<_, TokenTransaction>(&query)
        .bind(user_id)
        .bind(kind)
        .bind(reference)
        .fetch_optional(conn)
        .await
}

async fn insert_transaction(
    conn: &mut PgConnection,
    row: &TxRow<'_>,
) -> Result<TokenTransaction, sqlx::Error> {
    let query = format!(
        "INSERT INTO token_transactions \
            (user_id, kind, source, amount, balance_after, category, reference, description) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {TX_COLUMNS}"
    );
    sqlx::query_as::<_, TokenTransaction>(&query)
        .bind(row.user_id)
        .bind(row.kind)
        .bind(row.source.as_str())
        .bind(row.amount)
        .bind(row.balance_after)
        .bind(row.category)
        .bind(row.reference)
        .bind(row.description)
        .fetch_one(conn)
        .await
}

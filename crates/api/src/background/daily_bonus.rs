//! Daily free-token grant.
//!
//! Once per local day every known account receives `amount` bonus tokens.
//! The grant reference is `daily:{YYYY-MM-DD}`, so the hourly tick and
//! restarts never pay twice for the same day.

use std::time::Duration;

use chrono::{FixedOffset, Utc};
use fortune_core::ledger::TransactionKind;
use fortune_core::schedule::local_date_string;
use fortune_core::types::TokenAmount;
use fortune_engine::{Grant, TokenLedger};
use tokio_util::sync::CancellationToken;

const GRANT_INTERVAL: Duration = Duration::from_secs(3600);

/// Idempotency reference for the grant on `date`.
pub fn daily_reference(date: &str) -> String {
    format!("daily:{date}")
}

/// Run the grant loop until `cancel` is triggered. `amount == 0` disables it.
pub async fn run(
    ledger: TokenLedger,
    amount: TokenAmount,
    utc_offset: FixedOffset,
    cancel: CancellationToken,
) {
    if amount <= 0 {
        tracing::info!("Daily bonus disabled");
        return;
    }

    tracing::info!(amount, "Daily bonus job started");
    let mut interval = tokio::time::interval(GRANT_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Daily bonus job stopping");
                break;
            }
            _ = interval.tick() => {
                let date = local_date_string(Utc::now(), utc_offset);
                grant_all(&ledger, amount, &date).await;
            }
        }
    }
}

/// Grant the bonus for `date` to every account. Returns how many grants
/// were newly applied.
pub async fn grant_all(ledger: &TokenLedger, amount: TokenAmount, date: &str) -> usize {
    let user_ids = match ledger.user_ids().await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(error = %e, "Daily bonus: failed to list accounts");
            return 0;
        }
    };

    let reference = daily_reference(date);
    let mut applied = 0;
    for user_id in user_ids {
        let grant = Grant {
            user_id,
            amount,
            kind: TransactionKind::Bonus,
            reference: Some(reference.clone()),
            description: Some("Daily bonus".to_string()),
        };
        match ledger.credit(grant).await {
            Ok(result) if result.applied => applied += 1,
            Ok(_) => {}
            Err(e) => tracing::warn!(%user_id, error = %e, "Daily bonus: grant failed"),
        }
    }

    if applied > 0 {
        tracing::info!(applied, date, "Daily bonus granted");
    }
    applied
}

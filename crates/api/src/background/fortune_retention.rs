//! Periodic purge of long-expired fortunes.
//!
//! Expired rows are never served, but they stay in `fortunes` until this job
//! deletes them `retention_days` after expiry.

use std::time::Duration;

use chrono::Utc;
use fortune_db::repositories::FortuneRepo;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// How often the purge runs.
const PURGE_INTERVAL: Duration = Duration::from_secs(3600); // 1 hour

/// Run the retention loop until `cancel` is triggered.
pub async fn run(pool: PgPool, retention_days: i64, cancel: CancellationToken) {
    tracing::info!(
        retention_days,
        interval_secs = PURGE_INTERVAL.as_secs(),
        "Fortune retention job started"
    );

    let mut interval = tokio::time::interval(PURGE_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Fortune retention job stopping");
                break;
            }
            _ = interval.tick() => {
                let cutoff = Utc::now() - chrono::Duration::days(retention_days);
                match FortuneRepo::purge_expired_before(&pool, cutoff).await {
                    Ok(0) => tracing::debug!("Fortune retention: nothing to purge"),
                    Ok(deleted) => tracing::info!(deleted, "Fortune retention: purged expired rows"),
                    Err(e) => tracing::error!(error = %e, "Fortune retention: purge failed"),
                }
            }
        }
    }
}

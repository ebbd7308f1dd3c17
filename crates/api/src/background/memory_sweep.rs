//! Evicts expired entries from the in-process cache tier.
//!
//! Reads already skip expired entries; the sweep only reclaims memory held
//! by keys nobody asks for again.

use std::sync::Arc;
use std::time::Duration;

use fortune_cache::MemoryTier;
use tokio_util::sync::CancellationToken;

const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

pub async fn run(memory: Arc<MemoryTier>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Memory sweep job stopping");
                break;
            }
            _ = interval.tick() => {
                let evicted = memory.sweep();
                if evicted > 0 {
                    tracing::debug!(evicted, remaining = memory.len(), "Memory sweep: evicted expired entries");
                }
            }
        }
    }
}

//! Counter stores for fixed-window rate limiting.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::error::CacheError;

/// Increment-and-expire counter shared by every instance of the service.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Increment `key` and return the new count. The first increment of a
    /// window starts a `window`-long expiry.
    async fn incr_with_expiry(&self, key: &str, window: Duration) -> Result<u64, CacheError>;
}

// ---------------------------------------------------------------------------
// Redis
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct RedisCounter {
    manager: ConnectionManager,
}

impl RedisCounter {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }
}

/// Increment and arm the window expiry in one server-side step. A key found
/// without a TTL is re-armed, so a counter can never outlive its window.
const INCR_WITH_EXPIRY_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if redis.call('TTL', KEYS[1]) < 0 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// Redis expiries are whole seconds; sub-second windows round up to one.
fn window_secs(window: Duration) -> u64 {
    window.as_secs().max(1)
}

#[async_trait]
impl RateLimitStore for RedisCounter {
    async fn incr_with_expiry(&self, key: &str, window: Duration) -> Result<u64, CacheError> {
        let mut conn = self.manager.clone();
        let count: u64 = redis::Script::new(INCR_WITH_EXPIRY_SCRIPT)
            .key(key)
            .arg(window_secs(window))
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// In-process
// ---------------------------------------------------------------------------

/// Single-instance counter store, used when no Redis is configured.
#[derive(Default)]
pub struct MemoryCounter {
    windows: Mutex<HashMap<String, (u64, Instant)>>,
}

impl MemoryCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for MemoryCounter {
    async fn incr_with_expiry(&self, key: &str, window: Duration) -> Result<u64, CacheError> {
        let mut windows = self
            .windows
            .lock()
            .map_err(|_| CacheError::Unavailable("counter lock poisoned".into()))?;
        let now = Instant::now();
        windows.retain(|_, (_, expires_at)| *expires_at > now);

        let slot = windows
            .entry(key.to_string())
            .or_insert((0, now + window));
        slot.0 += 1;
        Ok(slot.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_within_window() {
        let store = MemoryCounter::new();
        let window = Duration::from_secs(60);
        for expected in 1..=5 {
            assert_eq!(store.incr_with_expiry("k", window).await.unwrap(), expected);
        }
        assert_eq!(store.incr_with_expiry("other", window).await.unwrap(), 1);
    }

    #[test]
    fn window_secs_rounds_sub_second_windows_up() {
        assert_eq!(window_secs(Duration::from_millis(10)), 1);
        assert_eq!(window_secs(Duration::from_secs(60)), 60);
    }

    #[test]
    fn redis_script_arms_expiry_in_the_same_step() {
        let incr = INCR_WITH_EXPIRY_SCRIPT.find("INCR").unwrap();
        let expire = INCR_WITH_EXPIRY_SCRIPT.find("EXPIRE").unwrap();
        assert!(incr < expire);
        assert!(INCR_WITH_EXPIRY_SCRIPT.contains("TTL"));
    }

    #[tokio::test]
    async fn window_expiry_resets_count() {
        let store = MemoryCounter::new();
        let window = Duration::from_millis(20);
        store.incr_with_expiry("k", window).await.unwrap();
        store.incr_with_expiry("k", window).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.incr_with_expiry("k", window).await.unwrap(), 1);
    }
}

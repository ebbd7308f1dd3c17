//! Redis-backed cache tier.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::CacheError;
use crate::tier::CacheTier;

/// Keys scanned per `SCAN` round trip.
const SCAN_COUNT: u64 = 200;

/// Open a multiplexed, auto-reconnecting connection.
pub async fn connect(redis_url: &str) -> Result<ConnectionManager, CacheError> {
    let client = redis::Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;
    Ok(manager)
}

/// Cache tier stored in Redis with native key expiry.
///
/// All keys are stored as `{prefix}:{key}` so pattern operations never touch
/// keys owned by other components.
#[derive(Clone)]
pub struct RedisTier {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisTier {
    pub fn new(manager: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            manager,
            prefix: prefix.into(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    async fn scan(&self, pattern: &str, first_only: bool) -> Result<Vec<String>, CacheError> {
        let mut conn = self.manager.clone();
        let full_pattern = self.full_key(pattern);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&full_pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 || (first_only && !keys.is_empty()) {
                return Ok(keys);
            }
            cursor = next;
        }
    }
}

#[async_trait]
impl CacheTier for RedisTier {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(self.full_key(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let secs = ttl.as_secs();
        if secs == 0 {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        let _: () = conn.set_ex(self.full_key(key), value, secs).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.manager.clone();
        let removed: u64 = conn.del(self.full_key(key)).await?;
        Ok(removed > 0)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let keys = self.scan(pattern, false).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.manager.clone();
        let removed: u64 = conn.del(keys).await?;
        Ok(removed)
    }

    async fn exists_pattern(&self, pattern: &str) -> Result<bool, CacheError> {
        Ok(!self.scan(pattern, true).await?.is_empty())
    }
}

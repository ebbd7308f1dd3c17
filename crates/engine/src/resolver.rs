//! Tiered cache resolver: memory, then distributed, then the persistent
//! store, with backfill on the way out and write-through on the way in.
//!
//! Only a failed store lookup is ever surfaced; every other tier failure is
//! logged and the remaining tiers carry on.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fortune_cache::{CacheTier, MemoryTier};
use fortune_core::category::CategoryGroup;
use fortune_core::schedule::{is_live, tier_ttl};
use fortune_core::types::{Timestamp, UserId};
use serde::{Deserialize, Serialize};

use crate::ports::{FortuneStore, HistoryEntry};

/// Placeholder for absent key segments.
const NONE_SEGMENT: &str = "none";

// ---------------------------------------------------------------------------
// Keys and entries
// ---------------------------------------------------------------------------

/// Identity of one cached fortune.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FortuneKey {
    pub user_id: UserId,
    pub category: String,
    pub group: CategoryGroup,
    /// Local date, set only for date-bound groups.
    pub date: Option<String>,
    /// Digest of interactive input, set only for interactive requests.
    pub input_hash: Option<String>,
}

impl FortuneKey {
    /// `group:user:category:date|none:hash|none`
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.group.as_str(),
            self.user_id,
            self.category,
            self.date.as_deref().unwrap_or(NONE_SEGMENT),
            self.input_hash.as_deref().unwrap_or(NONE_SEGMENT),
        )
    }

    /// Glob matching every key of `user_id`, optionally for one category.
    pub fn user_pattern(user_id: UserId, category: Option<&str>) -> String {
        format!("*:{user_id}:{}:*", category.unwrap_or("*"))
    }
}

/// Envelope stored in every tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedFortune {
    pub payload: serde_json::Value,
    pub group: CategoryGroup,
    pub generated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Tier that served a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSource {
    Memory,
    Redis,
    Database,
}

impl CacheSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
            Self::Database => "database",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub entry: CachedFortune,
    pub tier: CacheSource,
}

/// What a write-through actually reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOutcome {
    pub persisted: bool,
    pub distributed: bool,
    pub memory: bool,
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

pub struct CacheResolver {
    memory: Arc<MemoryTier>,
    distributed: Option<Arc<dyn CacheTier>>,
    store: Arc<dyn FortuneStore>,
    memory_ttl_cap: Duration,
    distributed_ttl_cap: Duration,
}

impl CacheResolver {
    pub fn new(
        memory: Arc<MemoryTier>,
        distributed: Option<Arc<dyn CacheTier>>,
        store: Arc<dyn FortuneStore>,
        memory_ttl_cap: Duration,
        distributed_ttl_cap: Duration,
    ) -> Self {
        Self {
            memory,
            distributed,
            store,
            memory_ttl_cap,
            distributed_ttl_cap,
        }
    }

    pub fn memory(&self) -> &Arc<MemoryTier> {
        &self.memory
    }

    /// Look `key` up tier by tier. Hits in slower tiers backfill the faster
    /// ones. A failed store read is treated as a miss.
    pub async fn resolve(&self, key: &FortuneKey, now: Timestamp) -> Option<Resolved> {
        let cache_key = key.cache_key();

        if let Some(entry) = self.read_tier(self.memory.as_ref(), &cache_key, now).await {
            tracing::debug!(cache_key, tier = "memory", "Cache hit");
            return Some(Resolved {
                entry,
                tier: CacheSource::Memory,
            });
        }

        if let Some(distributed) = &self.distributed {
            if let Some(entry) = self.read_tier(distributed.as_ref(), &cache_key, now).await {
                tracing::debug!(cache_key, tier = "redis", "Cache hit");
                self.write_tier(self.memory.as_ref(), &cache_key, &entry, now, self.memory_ttl_cap)
                    .await;
                return Some(Resolved {
                    entry,
                    tier: CacheSource::Redis,
                });
            }
        }

        match self.store.find_live(key, now).await {
            Ok(Some(entry)) => {
                tracing::debug!(cache_key, tier = "database", "Cache hit");
                if let Some(distributed) = &self.distributed {
                    self.write_tier(
                        distributed.as_ref(),
                        &cache_key,
                        &entry,
                        now,
                        self.distributed_ttl_cap,
                    )
                    .await;
                }
                self.write_tier(self.memory.as_ref(), &cache_key, &entry, now, self.memory_ttl_cap)
                    .await;
                Some(Resolved {
                    entry,
                    tier: CacheSource::Database,
                })
            }
            Ok(None) => {
                tracing::debug!(cache_key, "Cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(cache_key, tier = "database", error = %e, "Cache tier unavailable");
                None
            }
        }
    }

    /// Write-through: store, then distributed, then memory. A failed tier is
    /// logged; the others are still written.
    pub async fn store(
        &self,
        key: &FortuneKey,
        entry: &CachedFortune,
        now: Timestamp,
    ) -> StoreOutcome {
        let cache_key = key.cache_key();
        let mut outcome = StoreOutcome::default();

        match self.store.upsert(key, entry).await {
            Ok(()) => outcome.persisted = true,
            Err(e) => {
                tracing::warn!(cache_key, error = %e, "Failed to persist fortune");
            }
        }

        if let Some(distributed) = &self.distributed {
            outcome.distributed = self
                .write_tier(distributed.as_ref(), &cache_key, entry, now, self.distributed_ttl_cap)
                .await;
        }

        outcome.memory = self
            .write_tier(self.memory.as_ref(), &cache_key, entry, now, self.memory_ttl_cap)
            .await;

        outcome
    }

    /// Remove fast-tier keys matching `pattern`. Returns the count removed.
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        let mut removed = match self.memory.delete_pattern(pattern).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(pattern, tier = "memory", error = %e, "Invalidate failed");
                0
            }
        };
        if let Some(distributed) = &self.distributed {
            match distributed.delete_pattern(pattern).await {
                Ok(n) => removed += n,
                Err(e) => {
                    tracing::warn!(pattern, tier = "redis", error = %e, "Invalidate failed");
                }
            }
        }
        removed
    }

    /// Drop a user's cached fortunes everywhere. Persisted rows are expired,
    /// not deleted.
    pub async fn invalidate_user(&self, user_id: UserId, category: Option<&str>, now: Timestamp) -> u64 {
        let removed = self
            .invalidate(&FortuneKey::user_pattern(user_id, category))
            .await;
        let expired = match self.store.expire_for_user(user_id, category, now).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "Failed to expire persisted fortunes");
                0
            }
        };
        tracing::info!(%user_id, category, removed, expired, "User cache invalidated");
        removed + expired
    }

    /// Whether any fast tier holds a live key matching `pattern`.
    pub async fn exists(&self, pattern: &str) -> bool {
        if matches!(self.memory.exists_pattern(pattern).await, Ok(true)) {
            return true;
        }
        match &self.distributed {
            Some(distributed) => match distributed.exists_pattern(pattern).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(pattern, tier = "redis", error = %e, "Exists check failed");
                    false
                }
            },
            None => false,
        }
    }

    /// Of `categories`, those with a live persisted record for `user_id`.
    pub async fn live_categories(
        &self,
        user_id: UserId,
        categories: &[String],
        now: Timestamp,
    ) -> Vec<String> {
        match self.store.live_categories(user_id, categories, now).await {
            Ok(live) => live,
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "Failed to list live categories");
                Vec::new()
            }
        }
    }

    /// Best-effort append to the permanent history.
    pub async fn append_history(&self, entry: &HistoryEntry) {
        if let Err(e) = self.store.append_history(entry).await {
            tracing::warn!(
                user_id = %entry.user_id,
                category = %entry.category,
                error = %e,
                "Failed to append fortune history"
            );
        }
    }

    // ---- private helpers ----

    async fn read_tier(
        &self,
        tier: &dyn CacheTier,
        cache_key: &str,
        now: Timestamp,
    ) -> Option<CachedFortune> {
        let raw = match tier.get(cache_key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(
                    cache_key,
                    tier = tier.name(),
                    unreachable = e.is_connection_error(),
                    error = %e,
                    "Cache tier read failed"
                );
                return None;
            }
        };

        match serde_json::from_str::<CachedFortune>(&raw) {
            Ok(entry) if is_live(entry.expires_at, now) => Some(entry),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(cache_key, tier = tier.name(), error = %e, "Discarding undecodable cache entry");
                if let Err(e) = tier.delete(cache_key).await {
                    tracing::debug!(cache_key, tier = tier.name(), error = %e, "Failed to drop undecodable entry");
                }
                None
            }
        }
    }

    /// Returns `true` if the entry was written.
    async fn write_tier(
        &self,
        tier: &dyn CacheTier,
        cache_key: &str,
        entry: &CachedFortune,
        now: Timestamp,
        cap: Duration,
    ) -> bool {
        let Some(ttl) = tier_ttl(entry.expires_at, now, cap) else {
            return false;
        };
        let raw = match serde_json::to_string(entry) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(cache_key, error = %e, "Failed to encode cache entry");
                return false;
            }
        };
        match tier.set(cache_key, raw, ttl).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    cache_key,
                    tier = tier.name(),
                    unreachable = e.is_connection_error(),
                    error = %e,
                    "Cache tier write failed"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_shape() {
        let user = UserId::nil();
        let key = FortuneKey {
            user_id: user,
            category: "daily".into(),
            group: CategoryGroup::DailyComprehensive,
            date: Some("2026-10-16".into()),
            input_hash: None,
        };
        assert_eq!(
            key.cache_key(),
            format!("daily_comprehensive:{user}:daily:2026-10-16:none")
        );
    }

    #[test]
    fn user_pattern_matches_only_that_user() {
        let user = UserId::new_v4();
        let other = UserId::new_v4();
        let key = FortuneKey {
            user_id: user,
            category: "tarot".into(),
            group: CategoryGroup::Interactive,
            date: None,
            input_hash: Some("abcd1234".into()),
        };
        let pattern = FortuneKey::user_pattern(user, None);
        assert!(fortune_cache::glob_match(&pattern, &key.cache_key()));
        assert!(fortune_cache::glob_match(
            &FortuneKey::user_pattern(user, Some("tarot")),
            &key.cache_key()
        ));
        assert!(!fortune_cache::glob_match(
            &FortuneKey::user_pattern(other, None),
            &key.cache_key()
        ));
    }
}

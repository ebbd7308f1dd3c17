//! Fixed-window request limiting per `(user, category)`.
//!
//! Counting is delegated to a shared [`RateLimitStore`]. Any store failure,
//! or no store at all, fails open.

use std::sync::Arc;
use std::time::Duration;

use fortune_cache::RateLimitStore;
use fortune_core::types::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Requests left in the current window.
    pub remaining: u64,
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Option<Arc<dyn RateLimitStore>>,
    limit: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Option<Arc<dyn RateLimitStore>>, limit: u64, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
        }
    }

    pub fn key(user_id: UserId, category: &str) -> String {
        format!("rate_limit:fortune:{user_id}:{category}")
    }

    /// Count this request against the default limit.
    pub async fn check(&self, user_id: UserId, category: &str) -> RateDecision {
        self.check_and_increment(&Self::key(user_id, category), self.limit, self.window)
            .await
    }

    /// Count one request against `identity` and decide whether it may proceed.
    pub async fn check_and_increment(
        &self,
        identity: &str,
        limit: u64,
        window: Duration,
    ) -> RateDecision {
        let Some(store) = &self.store else {
            return RateDecision {
                allowed: true,
                remaining: limit,
            };
        };

        match store.incr_with_expiry(identity, window).await {
            Ok(count) => RateDecision {
                allowed: count <= limit,
                remaining: limit.saturating_sub(count),
            },
            Err(e) => {
                tracing::warn!(identity, error = %e, "Rate limit store unavailable, allowing request");
                RateDecision {
                    allowed: true,
                    remaining: limit,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use fortune_cache::{CacheError, MemoryCounter};

    use super::*;

    struct BrokenStore;

    #[async_trait]
    impl RateLimitStore for BrokenStore {
        async fn incr_with_expiry(&self, _key: &str, _window: Duration) -> Result<u64, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn eleventh_call_in_window_is_rejected() {
        let limiter = RateLimiter::new(
            Some(Arc::new(MemoryCounter::new())),
            10,
            Duration::from_secs(60),
        );
        let user = UserId::new_v4();
        for i in 0..10 {
            let d = limiter.check(user, "daily").await;
            assert!(d.allowed, "call {} should pass", i + 1);
        }
        let d = limiter.check(user, "daily").await;
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);

        // Other categories have their own window.
        assert!(limiter.check(user, "love").await.allowed);
    }

    #[tokio::test]
    async fn store_failure_fails_open() {
        let limiter = RateLimiter::new(Some(Arc::new(BrokenStore)), 1, Duration::from_secs(60));
        let user = UserId::new_v4();
        assert!(limiter.check(user, "daily").await.allowed);
        assert!(limiter.check(user, "daily").await.allowed);
    }

    #[tokio::test]
    async fn no_store_allows_everything() {
        let limiter = RateLimiter::new(None, 0, Duration::from_secs(60));
        assert!(limiter.check(UserId::new_v4(), "daily").await.allowed);
    }
}

//! The cache tier contract and key pattern matching.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheError;

/// A key/value tier holding serialized entries with a per-key TTL.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Short name used in logs and `cache_source` reporting.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` for `ttl`. A zero TTL is a no-op.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every key matching a glob `pattern`. Returns the count removed.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError>;

    /// Whether any live key matches `pattern`.
    async fn exists_pattern(&self, pattern: &str) -> Result<bool, CacheError>;
}

/// Redis-style glob match supporting `*` (any run) and `?` (one char).
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let k: Vec<char> = key.chars().collect();

    let (mut pi, mut ki) = (0, 0);
    let mut star: Option<usize> = None;
    let mut star_k = 0;

    while ki < k.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == k[ki]) {
            pi += 1;
            ki += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            star_k = ki;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            star_k += 1;
            ki = star_k;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use fortune_core::ledger::WELCOME_BONUS;
use fortune_core::schedule::{offset_from_hours, DEFAULT_UTC_OFFSET_HOURS};
use fortune_core::types::TokenAmount;

use crate::dispatcher::RetryPolicy;

/// Default bound on one generation. Stays below the HTTP layer's default
/// 30s request timeout so a slow completion still ends in fallback content.
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 25;

/// Engine tuning loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Requests allowed per `(user, category)` per window.
    pub rate_limit: u64,
    pub rate_window: Duration,
    /// Maximum entries in the in-process tier.
    pub memory_capacity: usize,
    pub memory_ttl_cap: Duration,
    pub distributed_ttl_cap: Duration,
    /// The product's local day, as a fixed offset from UTC.
    pub utc_offset: FixedOffset,
    /// Upper bound on one generation including retries; exceeding it yields
    /// fallback content.
    pub generation_timeout: Duration,
    /// Tokens granted once when an account is opened.
    pub welcome_bonus: TokenAmount,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rate_limit: 10,
            rate_window: Duration::from_secs(60),
            memory_capacity: 1000,
            memory_ttl_cap: Duration::from_secs(3600),
            distributed_ttl_cap: Duration::from_secs(86_400),
            utc_offset: offset_from_hours(DEFAULT_UTC_OFFSET_HOURS).unwrap_or_else(|_| Utc.fix()),
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
            welcome_bonus: WELCOME_BONUS,
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env var                              | Default  |
    /// |--------------------------------------|----------|
    /// | `FORTUNE_RATE_LIMIT`                 | `10`     |
    /// | `FORTUNE_RATE_WINDOW_SECS`           | `60`     |
    /// | `FORTUNE_MEMORY_CAPACITY`            | `1000`   |
    /// | `FORTUNE_MEMORY_TTL_CAP_SECS`        | `3600`   |
    /// | `FORTUNE_DISTRIBUTED_TTL_CAP_SECS`   | `86400`  |
    /// | `FORTUNE_UTC_OFFSET_HOURS`           | `9`      |
    /// | `FORTUNE_GENERATION_TIMEOUT_SECS`    | `25`     |
    /// | `FORTUNE_WELCOME_BONUS`              | `10`     |
    /// | `COMPLETION_MAX_ATTEMPTS`            | `3`      |
    /// | `COMPLETION_RETRY_BASE_MS`           | `1000`   |
    pub fn from_env() -> Self {
        let rate_limit: u64 = env_or("FORTUNE_RATE_LIMIT", "10")
            .parse()
            .expect("FORTUNE_RATE_LIMIT must be a valid u64");

        let rate_window_secs: u64 = env_or("FORTUNE_RATE_WINDOW_SECS", "60")
            .parse()
            .expect("FORTUNE_RATE_WINDOW_SECS must be a valid u64");

        let memory_capacity: usize = env_or("FORTUNE_MEMORY_CAPACITY", "1000")
            .parse()
            .expect("FORTUNE_MEMORY_CAPACITY must be a valid usize");

        let memory_ttl_cap_secs: u64 = env_or("FORTUNE_MEMORY_TTL_CAP_SECS", "3600")
            .parse()
            .expect("FORTUNE_MEMORY_TTL_CAP_SECS must be a valid u64");

        let distributed_ttl_cap_secs: u64 = env_or("FORTUNE_DISTRIBUTED_TTL_CAP_SECS", "86400")
            .parse()
            .expect("FORTUNE_DISTRIBUTED_TTL_CAP_SECS must be a valid u64");

        let offset_hours: i32 = env_or("FORTUNE_UTC_OFFSET_HOURS", "9")
            .parse()
            .expect("FORTUNE_UTC_OFFSET_HOURS must be a valid i32");
        let utc_offset =
            offset_from_hours(offset_hours).expect("FORTUNE_UTC_OFFSET_HOURS must be within +-23");

        let generation_timeout_secs: u64 = env_or(
            "FORTUNE_GENERATION_TIMEOUT_SECS",
            &DEFAULT_GENERATION_TIMEOUT_SECS.to_string(),
        )
        .parse()
        .expect("FORTUNE_GENERATION_TIMEOUT_SECS must be a valid u64");

        let welcome_bonus: TokenAmount = env_or("FORTUNE_WELCOME_BONUS", &WELCOME_BONUS.to_string())
            .parse()
            .expect("FORTUNE_WELCOME_BONUS must be a valid i64");

        let max_attempts: u32 = env_or("COMPLETION_MAX_ATTEMPTS", "3")
            .parse()
            .expect("COMPLETION_MAX_ATTEMPTS must be a valid u32");

        let retry_base_ms: u64 = env_or("COMPLETION_RETRY_BASE_MS", "1000")
            .parse()
            .expect("COMPLETION_RETRY_BASE_MS must be a valid u64");

        Self {
            rate_limit,
            rate_window: Duration::from_secs(rate_window_secs),
            memory_capacity,
            memory_ttl_cap: Duration::from_secs(memory_ttl_cap_secs),
            distributed_ttl_cap: Duration::from_secs(distributed_ttl_cap_secs),
            utc_offset,
            generation_timeout: Duration::from_secs(generation_timeout_secs),
            welcome_bonus: welcome_bonus.max(0),
            retry: RetryPolicy {
                max_attempts: max_attempts.max(1),
                base_delay: Duration::from_millis(retry_base_ms),
            },
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

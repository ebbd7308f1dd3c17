//! Fast cache tiers and shared counters.
//!
//! [`CacheTier`] is implemented by a bounded in-process [`MemoryTier`] and a
//! Redis-backed [`RedisTier`]. [`RateLimitStore`] is the counter store behind
//! per-user rate limiting, with Redis and in-process implementations.

pub mod distributed;
pub mod error;
pub mod memory;
pub mod rate_limit;
pub mod tier;

pub use distributed::{connect, RedisTier};
pub use error::CacheError;
pub use memory::MemoryTier;
pub use rate_limit::{MemoryCounter, RateLimitStore, RedisCounter};
pub use tier::{glob_match, CacheTier};

//! The fortune orchestration engine.
//!
//! Serves fortunes through a tiered cache, charges for fresh generations
//! against a token ledger, and degrades to deterministic fallback content
//! when the completion service cannot deliver.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod pg;
pub mod ports;
pub mod prompt;
pub mod rate_limiter;
pub mod resolver;
pub mod single_flight;

pub use config::EngineConfig;
pub use dispatcher::{Dispatcher, GenerationSource, RetryPolicy};
pub use error::EngineError;
pub use ledger::{BalanceView, Grant, TokenLedger};
pub use orchestrator::{FortuneRequest, FortuneResponse, Orchestrator, RejectReason, WarmReport};
pub use rate_limiter::RateLimiter;
pub use resolver::{CacheResolver, CacheSource};

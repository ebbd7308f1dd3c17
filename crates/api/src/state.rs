use std::sync::Arc;

use fortune_cache::{CacheTier, MemoryTier, RateLimitStore};
use fortune_completion::CompletionService;
use fortune_engine::pg::{PgFortuneStore, PgLedgerStore};
use fortune_engine::{
    CacheResolver, Dispatcher, EngineConfig, Orchestrator, RateLimiter, TokenLedger,
};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is an `Arc` or a handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: fortune_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// The fortune engine, constructed once at startup.
    pub engine: Orchestrator,
}

impl AppState {
    pub fn ledger(&self) -> &TokenLedger {
        self.engine.ledger()
    }
}

/// Wire the engine over Postgres stores.
///
/// `distributed` is the optional shared cache tier; `counter` backs the rate
/// limiter and should be shared across instances in production.
pub fn build_orchestrator(
    pool: &fortune_db::DbPool,
    config: EngineConfig,
    completion: Arc<dyn CompletionService>,
    distributed: Option<Arc<dyn CacheTier>>,
    counter: Arc<dyn RateLimitStore>,
) -> Orchestrator {
    let memory = Arc::new(MemoryTier::new(config.memory_capacity));
    let resolver = Arc::new(CacheResolver::new(
        memory,
        distributed,
        Arc::new(PgFortuneStore::new(pool.clone())),
        config.memory_ttl_cap,
        config.distributed_ttl_cap,
    ));
    let ledger = TokenLedger::new(Arc::new(PgLedgerStore::new(pool.clone())));
    let rate_limiter = RateLimiter::new(Some(counter), config.rate_limit, config.rate_window);
    let dispatcher = Dispatcher::new(completion, config.retry);

    Orchestrator::new(config, resolver, ledger, rate_limiter, dispatcher)
}

//! In-memory fakes of every engine port, plus a harness that wires them
//! into an [`Orchestrator`].

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use fortune_cache::{CacheError, CacheTier, MemoryCounter, MemoryTier};
use fortune_completion::{
    Completion, CompletionError, CompletionRequest, CompletionService, Usage,
};
use fortune_core::ledger::{
    choose_debit_source, display_balance, quota_remaining, DebitSource, Plan, TransactionKind,
};
use fortune_core::schedule::is_live;
use fortune_core::types::{DbId, Timestamp, TokenAmount, UserId};
use fortune_engine::dispatcher::RetryPolicy;
use fortune_engine::ledger::{
    AccountSnapshot, CreditResult, DebitResult, Grant, LedgerEntry, Reservation,
};
use fortune_engine::ports::{FortuneStore, HistoryEntry, LedgerStore, StoreError};
use fortune_engine::resolver::{CachedFortune, FortuneKey};
use fortune_engine::{
    CacheResolver, Dispatcher, EngineConfig, Orchestrator, RateLimiter, TokenLedger,
};
use serde_json::json;

// ---------------------------------------------------------------------------
// Fortune store
// ---------------------------------------------------------------------------

type RowKey = (UserId, String, Option<String>);

#[derive(Default)]
pub struct MemFortuneStore {
    rows: Mutex<HashMap<RowKey, CachedFortune>>,
    history: Mutex<Vec<HistoryEntry>>,
    pub fail_writes: AtomicBool,
}

impl MemFortuneStore {
    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().unwrap().clone()
    }

    pub fn row(&self, user_id: UserId, category: &str) -> Option<CachedFortune> {
        self.rows
            .lock()
            .unwrap()
            .get(&(user_id, category.to_string(), None))
            .cloned()
    }
}

#[async_trait]
impl FortuneStore for MemFortuneStore {
    async fn find_live(
        &self,
        key: &FortuneKey,
        now: Timestamp,
    ) -> Result<Option<CachedFortune>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .get(&(key.user_id, key.category.clone(), key.input_hash.clone()))
            .filter(|e| is_live(e.expires_at, now))
            .cloned())
    }

    async fn upsert(&self, key: &FortuneKey, entry: &CachedFortune) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError("database unavailable".into()));
        }
        self.rows.lock().unwrap().insert(
            (key.user_id, key.category.clone(), key.input_hash.clone()),
            entry.clone(),
        );
        Ok(())
    }

    async fn expire_for_user(
        &self,
        user_id: UserId,
        category: Option<&str>,
        now: Timestamp,
    ) -> Result<u64, StoreError> {
        let mut expired = 0;
        for ((user, cat, _), entry) in self.rows.lock().unwrap().iter_mut() {
            if *user == user_id
                && category.map_or(true, |c| c == cat)
                && is_live(entry.expires_at, now)
            {
                entry.expires_at = Some(now);
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn live_categories(
        &self,
        user_id: UserId,
        categories: &[String],
        now: Timestamp,
    ) -> Result<Vec<String>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(categories
            .iter()
            .filter(|c| {
                rows.get(&(user_id, (*c).clone(), None))
                    .is_some_and(|e| is_live(e.expires_at, now))
            })
            .cloned()
            .collect())
    }

    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError("database unavailable".into()));
        }
        self.history.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Ledger store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<UserId, AccountSnapshot>,
    log: Vec<LedgerEntry>,
    usage: Vec<Reservation>,
    next_id: DbId,
}

impl LedgerState {
    fn append(
        &mut self,
        user_id: UserId,
        kind: TransactionKind,
        source: DebitSource,
        amount: TokenAmount,
        balance_after: TokenAmount,
        category: Option<String>,
        reference: Option<String>,
    ) -> LedgerEntry {
        self.next_id += 1;
        let entry = LedgerEntry {
            id: self.next_id,
            user_id,
            kind,
            source,
            amount,
            balance_after,
            category,
            reference,
            description: None,
            created_at: Utc::now(),
        };
        self.log.push(entry.clone());
        entry
    }
}

/// Mirrors the row-locked PostgreSQL ledger under one mutex.
#[derive(Default)]
pub struct MemLedgerStore {
    state: Mutex<LedgerState>,
    pub fail_writes: AtomicBool,
    pub fail_refunds: AtomicBool,
    /// Fails the next credit only.
    pub fail_next_credit: AtomicBool,
}

impl MemLedgerStore {
    pub fn seed(&self, user_id: UserId, wallet: TokenAmount) {
        let mut state = self.state.lock().unwrap();
        state.accounts.insert(
            user_id,
            AccountSnapshot {
                user_id,
                wallet: 0,
                quota_limit: 0,
                quota_used: 0,
                is_unlimited: false,
                plan: Plan::Free,
            },
        );
        if wallet > 0 {
            state.accounts.get_mut(&user_id).unwrap().wallet = wallet;
            state.append(
                user_id,
                TransactionKind::Purchase,
                DebitSource::Wallet,
                wallet,
                wallet,
                None,
                Some("seed".into()),
            );
        }
    }

    pub fn wallet(&self, user_id: UserId) -> TokenAmount {
        self.state
            .lock()
            .unwrap()
            .accounts
            .get(&user_id)
            .map_or(0, |a| a.wallet)
    }

    pub fn log(&self, user_id: UserId) -> Vec<LedgerEntry> {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn usage_count(&self) -> usize {
        self.state.lock().unwrap().usage.len()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError("ledger unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LedgerStore for MemLedgerStore {
    async fn account(&self, user_id: UserId) -> Result<Option<AccountSnapshot>, StoreError> {
        Ok(self.state.lock().unwrap().accounts.get(&user_id).cloned())
    }

    async fn open_account(&self, user_id: UserId) -> Result<bool, StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        if state.accounts.contains_key(&user_id) {
            return Ok(false);
        }
        state.accounts.insert(
            user_id,
            AccountSnapshot {
                user_id,
                wallet: 0,
                quota_limit: 0,
                quota_used: 0,
                is_unlimited: false,
                plan: Plan::Free,
            },
        );
        Ok(true)
    }

    async fn debit(
        &self,
        user_id: UserId,
        amount: TokenAmount,
        category: &str,
    ) -> Result<DebitResult, StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        let Some(account) = state.accounts.get(&user_id).cloned() else {
            return Ok(DebitResult::Insufficient { available: 0 });
        };
        let remaining = quota_remaining(account.quota_limit, account.quota_used);
        let Some(source) =
            choose_debit_source(account.is_unlimited, account.wallet, remaining, amount)
        else {
            return Ok(DebitResult::Insufficient {
                available: display_balance(account.is_unlimited, account.wallet, remaining),
            });
        };

        let account = state.accounts.get_mut(&user_id).unwrap();
        let (recorded, after) = match source {
            DebitSource::Wallet => {
                account.wallet -= amount;
                (-amount, account.wallet)
            }
            DebitSource::Quota => {
                account.quota_used += amount;
                (-amount, account.quota_limit - account.quota_used)
            }
            DebitSource::Unlimited => (0, account.wallet),
        };
        let entry = state.append(
            user_id,
            TransactionKind::Usage,
            source,
            recorded,
            after,
            Some(category.to_string()),
            None,
        );
        Ok(DebitResult::Debited(entry))
    }

    async fn refund(
        &self,
        reservation: &Reservation,
        _reason: &str,
    ) -> Result<LedgerEntry, StoreError> {
        self.check_writable()?;
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(StoreError("ledger unavailable".into()));
        }
        let reference = format!("refund:{}", reservation.usage_entry_id);
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .log
            .iter()
            .find(|e| e.reference.as_deref() == Some(reference.as_str()))
        {
            return Ok(existing.clone());
        }
        let account = state
            .accounts
            .get_mut(&reservation.user_id)
            .ok_or_else(|| StoreError("no account".into()))?;
        let (recorded, after) = match reservation.source {
            DebitSource::Wallet => {
                account.wallet += reservation.amount;
                (reservation.amount, account.wallet)
            }
            DebitSource::Quota => {
                account.quota_used = (account.quota_used - reservation.amount).max(0);
                (reservation.amount, account.quota_limit - account.quota_used)
            }
            DebitSource::Unlimited => (0, account.wallet),
        };
        Ok(state.append(
            reservation.user_id,
            TransactionKind::Refund,
            reservation.source,
            recorded,
            after,
            Some(reservation.category.clone()),
            Some(reference),
        ))
    }

    async fn credit(&self, grant: &Grant) -> Result<CreditResult, StoreError> {
        self.check_writable()?;
        if self.fail_next_credit.swap(false, Ordering::SeqCst) {
            return Err(StoreError("credit interrupted".into()));
        }
        let mut state = self.state.lock().unwrap();
        if let Some(reference) = &grant.reference {
            if let Some(existing) = state.log.iter().find(|e| {
                e.user_id == grant.user_id
                    && e.kind == grant.kind
                    && e.reference.as_ref() == Some(reference)
            }) {
                return Ok(CreditResult {
                    entry: existing.clone(),
                    applied: false,
                });
            }
        }
        let account = state
            .accounts
            .entry(grant.user_id)
            .or_insert_with(|| AccountSnapshot {
                user_id: grant.user_id,
                wallet: 0,
                quota_limit: 0,
                quota_used: 0,
                is_unlimited: false,
                plan: Plan::Free,
            });
        account.wallet += grant.amount;
        let after = account.wallet;
        let entry = state.append(
            grant.user_id,
            grant.kind,
            DebitSource::Wallet,
            grant.amount,
            after,
            None,
            grant.reference.clone(),
        );
        Ok(CreditResult {
            entry,
            applied: true,
        })
    }

    async fn record_usage(&self, reservation: &Reservation) -> Result<(), StoreError> {
        self.check_writable()?;
        self.state.lock().unwrap().usage.push(reservation.clone());
        Ok(())
    }

    async fn apply_subscription(
        &self,
        user_id: UserId,
        plan: Plan,
        period_quota: TokenAmount,
    ) -> Result<AccountSnapshot, StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        let account = state.accounts.entry(user_id).or_insert_with(|| AccountSnapshot {
            user_id,
            wallet: 0,
            quota_limit: 0,
            quota_used: 0,
            is_unlimited: false,
            plan: Plan::Free,
        });
        account.plan = plan;
        account.is_unlimited = plan.is_unlimited();
        account.quota_limit = period_quota;
        account.quota_used = 0;
        Ok(account.clone())
    }

    async fn reset_quota_period(
        &self,
        user_id: UserId,
    ) -> Result<Option<AccountSnapshot>, StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        Ok(state.accounts.get_mut(&user_id).map(|a| {
            a.quota_used = 0;
            a.clone()
        }))
    }

    async fn history(&self, user_id: UserId, limit: i64) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut entries = self.log(user_id);
        entries.reverse();
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }

    async fn user_ids(&self) -> Result<Vec<UserId>, StoreError> {
        Ok(self.state.lock().unwrap().accounts.keys().copied().collect())
    }
}

// ---------------------------------------------------------------------------
// Completion service
// ---------------------------------------------------------------------------

pub enum Behaviour {
    /// Reply with a payload that includes the call number.
    Succeed,
    /// Fail every call with this error.
    Fail(fn() -> CompletionError),
    /// Reply after a delay.
    Slow(Duration),
    /// Reply with these payloads in order, then succeed.
    Script(Mutex<VecDeque<serde_json::Value>>),
}

pub struct FakeCompletion {
    behaviour: Behaviour,
    calls: AtomicU32,
}

impl FakeCompletion {
    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            calls: AtomicU32::new(0),
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::new(Behaviour::Succeed)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for FakeCompletion {
    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, CompletionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let content = match &self.behaviour {
            Behaviour::Succeed => json!({ "overall_score": 77, "summary": "fresh", "call": call }),
            Behaviour::Fail(make) => return Err(make()),
            Behaviour::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                json!({ "overall_score": 70, "call": call })
            }
            Behaviour::Script(replies) => replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| json!({ "overall_score": 77, "call": call })),
        };
        Ok(Completion {
            content,
            model: "fake-model".into(),
            usage: Usage {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
            },
        })
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

// ---------------------------------------------------------------------------
// Distributed tier fake
// ---------------------------------------------------------------------------

/// Stands in for the Redis tier. While `failing` is set every call errors
/// the way an unreachable server does.
pub struct FlakyTier {
    inner: MemoryTier,
    pub failing: AtomicBool,
}

impl FlakyTier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryTier::new(1000),
            failing: AtomicBool::new(false),
        })
    }

    pub fn entry_count(&self) -> usize {
        self.inner.len()
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheTier for FlakyTier {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        self.check()?;
        self.inner.delete_pattern(pattern).await
    }

    async fn exists_pattern(&self, pattern: &str) -> Result<bool, CacheError> {
        self.check()?;
        self.inner.exists_pattern(pattern).await
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub fortunes: Arc<MemFortuneStore>,
    pub ledger_store: Arc<MemLedgerStore>,
    pub completion: Arc<FakeCompletion>,
    pub memory: Arc<MemoryTier>,
    clock: Arc<Mutex<Timestamp>>,
}

impl Harness {
    pub fn new(completion: Arc<FakeCompletion>) -> Self {
        Self::with_config(completion, test_config())
    }

    pub fn with_config(completion: Arc<FakeCompletion>, config: EngineConfig) -> Self {
        Self::build(completion, config, None)
    }

    pub fn with_distributed(completion: Arc<FakeCompletion>, tier: Arc<FlakyTier>) -> Self {
        Self::build(completion, test_config(), Some(tier))
    }

    fn build(
        completion: Arc<FakeCompletion>,
        config: EngineConfig,
        distributed: Option<Arc<FlakyTier>>,
    ) -> Self {
        let fortunes = Arc::new(MemFortuneStore::default());
        let ledger_store = Arc::new(MemLedgerStore::default());
        let memory = Arc::new(MemoryTier::new(config.memory_capacity));

        let resolver = Arc::new(CacheResolver::new(
            Arc::clone(&memory),
            distributed.map(|tier| tier as Arc<dyn CacheTier>),
            fortunes.clone(),
            config.memory_ttl_cap,
            config.distributed_ttl_cap,
        ));
        let ledger = TokenLedger::new(ledger_store.clone());
        let rate_limiter = RateLimiter::new(
            Some(Arc::new(MemoryCounter::new())),
            config.rate_limit,
            config.rate_window,
        );
        let dispatcher = Dispatcher::new(completion.clone(), config.retry);

        let clock = Arc::new(Mutex::new(default_now()));
        let clock_source = Arc::clone(&clock);
        let orchestrator = Orchestrator::new(config, resolver, ledger, rate_limiter, dispatcher)
            .with_clock(Arc::new(move || *clock_source.lock().unwrap()));

        Self {
            orchestrator,
            fortunes,
            ledger_store,
            completion,
            memory,
            clock,
        }
    }

    pub fn set_now(&self, now: Timestamp) {
        *self.clock.lock().unwrap() = now;
    }

    pub fn ledger(&self) -> &TokenLedger {
        self.orchestrator.ledger()
    }
}

/// 2026-10-16 10:00 in UTC+9.
pub fn default_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 1, 0, 0).unwrap()
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        // Scenario users are seeded explicitly.
        welcome_bonus: 0,
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        },
        ..EngineConfig::default()
    }
}

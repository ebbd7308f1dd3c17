//! The fortune orchestrator: rate limit, cache lookup, token reservation,
//! generation and settlement for one request.
//!
//! ```text
//! rate limit ──reject──▶ rate_limited
//!     │
//! classify + key ──▶ resolve ──hit──▶ cached content
//!     │ miss
//! single-flight { resolve again ──hit──▶ cached content
//!                 reserve ──short──▶ insufficient_tokens
//!                 generate (timeout ⇒ fallback)
//!                   fresh    ──▶ write-through, history, commit
//!                   fallback ──▶ refund }
//! ```

use std::sync::Arc;

use chrono::Utc;
use fortune_core::category::{classify_name, CategoryGroup, Classification};
use fortune_core::hashing::input_hash;
use fortune_core::profile::UserProfile;
use fortune_core::schedule::{expires_at, local_date_string};
use fortune_core::types::{Timestamp, TokenAmount, UserId};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::dispatcher::{fallback_generated, Dispatcher, Generated, GenerationSource};
use crate::error::EngineError;
use crate::ledger::{ReserveOutcome, TokenLedger};
use crate::ports::HistoryEntry;
use crate::prompt::PromptContext;
use crate::rate_limiter::RateLimiter;
use crate::resolver::{CacheResolver, CacheSource, CachedFortune, FortuneKey, Resolved};
use crate::single_flight::SingleFlight;

/// Reason recorded on the refund of a failed generation.
const REFUND_REASON: &str = "generation_failed";

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FortuneRequest {
    pub user_id: UserId,
    pub category: String,
    #[serde(default)]
    pub profile: UserProfile,
    #[serde(default)]
    pub interactive_input: Option<serde_json::Value>,
}

/// Why a request was turned away without content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    RateLimited,
    InsufficientTokens,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::InsufficientTokens => "insufficient_tokens",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FortuneResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub error_code: Option<RejectReason>,
    pub cached: bool,
    pub cache_source: Option<CacheSource>,
    pub source: Option<GenerationSource>,
    pub generated_at: Option<Timestamp>,
    /// Tokens actually charged for this response.
    pub token_cost: TokenAmount,
}

impl FortuneResponse {
    fn hit(resolved: Resolved) -> Self {
        Self {
            success: true,
            data: Some(resolved.entry.payload),
            error: None,
            error_code: None,
            cached: true,
            cache_source: Some(resolved.tier),
            source: Some(GenerationSource::Fresh),
            generated_at: Some(resolved.entry.generated_at),
            token_cost: 0,
        }
    }

    fn generated(generated: Generated, generated_at: Timestamp, token_cost: TokenAmount) -> Self {
        Self {
            success: true,
            data: Some(generated.payload),
            error: None,
            error_code: None,
            cached: false,
            cache_source: None,
            source: Some(generated.source),
            generated_at: Some(generated_at),
            token_cost,
        }
    }

    fn rejected(reason: RejectReason, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_code: Some(reason),
            cached: false,
            cache_source: None,
            source: None,
            generated_at: None,
            token_cost: 0,
        }
    }
}

/// Outcome of [`Orchestrator::warm_related`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarmReport {
    /// Categories generated and cached.
    pub warmed: Vec<String>,
    /// Categories that only produced fallback content and were left cold.
    pub skipped: Vec<String>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<EngineConfig>,
    resolver: Arc<CacheResolver>,
    ledger: TokenLedger,
    rate_limiter: RateLimiter,
    dispatcher: Dispatcher,
    flights: Arc<SingleFlight<FortuneResponse>>,
    clock: Clock,
}

impl Orchestrator {
    pub fn new(
        config: EngineConfig,
        resolver: Arc<CacheResolver>,
        ledger: TokenLedger,
        rate_limiter: RateLimiter,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            config: Arc::new(config),
            resolver,
            ledger,
            rate_limiter,
            dispatcher,
            flights: Arc::new(SingleFlight::new()),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    pub fn resolver(&self) -> &Arc<CacheResolver> {
        &self.resolver
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn now(&self) -> Timestamp {
        (self.clock)()
    }

    /// Serve a fortune from cache, or charge for and generate a new one.
    ///
    /// Rejections come back as `Ok` responses with `success == false`. The
    /// only error that aborts a request is a failed ledger write.
    pub async fn get_or_create_fortune(
        &self,
        request: FortuneRequest,
    ) -> Result<FortuneResponse, EngineError> {
        let category = request.category.trim().to_string();
        if category.is_empty() {
            return Err(EngineError::InvalidInput("category must not be empty".into()));
        }
        let user_id = request.user_id;

        let decision = self.rate_limiter.check(user_id, &category).await;
        if !decision.allowed {
            tracing::warn!(%user_id, category, "Fortune request rate limited");
            return Ok(FortuneResponse::rejected(
                RejectReason::RateLimited,
                "Too many requests, try again shortly",
            ));
        }

        let classification = classify_name(&category);
        let now = self.now();
        let key = self.key_for(
            user_id,
            &category,
            classification.group,
            request.interactive_input.as_ref(),
            now,
        );

        if let Some(hit) = self.resolver.resolve(&key, now).await {
            return Ok(FortuneResponse::hit(hit));
        }

        let this = self.clone();
        let flight_key = key.cache_key();
        let request = FortuneRequest { category, ..request };
        let flight = self
            .flights
            .run(&flight_key, async move {
                this.generate_and_settle(request, key, classification).await
            })
            .await;
        if !flight.leader {
            tracing::debug!(%user_id, cache_key = flight_key, "Joined in-flight generation");
        }
        flight.value
    }

    /// Related categories of `category` with nothing cached for `user_id`.
    pub async fn missing_related(&self, user_id: UserId, category: &str) -> Vec<String> {
        let related: Vec<String> = classify_name(category)
            .related_categories
            .iter()
            .map(|c| c.as_str().to_string())
            .collect();
        if related.is_empty() {
            return related;
        }

        let live = self
            .resolver
            .live_categories(user_id, &related, self.now())
            .await;

        let mut missing = Vec::new();
        for candidate in related {
            if live.contains(&candidate) {
                continue;
            }
            let pattern = FortuneKey::user_pattern(user_id, Some(&candidate));
            if !self.resolver.exists(&pattern).await {
                missing.push(candidate);
            }
        }
        missing
    }

    /// Generate and cache the missing related categories of `category` in
    /// one batch call. Not charged to the user.
    pub async fn warm_related(
        &self,
        user_id: UserId,
        category: &str,
        profile: &UserProfile,
    ) -> Result<WarmReport, EngineError> {
        let missing = self.missing_related(user_id, category).await;
        if missing.is_empty() {
            return Ok(WarmReport::default());
        }

        let now = self.now();
        let date = local_date_string(now, self.config.utc_offset);
        let ctx = PromptContext {
            category,
            group: classify_name(category).group,
            profile,
            interactive_input: None,
            date: &date,
        };

        let generated = match tokio::time::timeout(
            self.config.generation_timeout,
            self.dispatcher.generate_batch(user_id, &missing, &ctx),
        )
        .await
        {
            Ok(generated) => generated,
            Err(_) => {
                tracing::warn!(%user_id, category, "Batch generation timed out");
                return Ok(WarmReport {
                    warmed: Vec::new(),
                    skipped: missing,
                });
            }
        };

        let mut report = WarmReport::default();
        for (related, output) in generated {
            if output.source != GenerationSource::Fresh {
                report.skipped.push(related);
                continue;
            }
            let group = classify_name(&related).group;
            let generated_at = self.now();
            let key = self.key_for(user_id, &related, group, None, generated_at);
            let entry = CachedFortune {
                payload: output.payload.clone(),
                group,
                generated_at,
                expires_at: expires_at(group, generated_at, self.config.utc_offset),
            };
            self.resolver.store(&key, &entry, generated_at).await;
            self.resolver
                .append_history(&HistoryEntry {
                    user_id,
                    category: related.clone(),
                    group,
                    payload: output.payload,
                    token_cost: 0,
                    model: output.model,
                })
                .await;
            report.warmed.push(related);
        }

        tracing::info!(
            %user_id,
            category,
            warmed = report.warmed.len(),
            skipped = report.skipped.len(),
            "Related categories warmed"
        );
        Ok(report)
    }

    /// Drop a user's cached fortunes, optionally for one category.
    pub async fn invalidate_user(&self, user_id: UserId, category: Option<&str>) -> u64 {
        self.resolver
            .invalidate_user(user_id, category, self.now())
            .await
    }

    // ---- private helpers ----

    fn key_for(
        &self,
        user_id: UserId,
        category: &str,
        group: CategoryGroup,
        interactive_input: Option<&serde_json::Value>,
        now: Timestamp,
    ) -> FortuneKey {
        FortuneKey {
            user_id,
            category: category.to_string(),
            group,
            date: group
                .is_date_bound()
                .then(|| local_date_string(now, self.config.utc_offset)),
            input_hash: interactive_input.filter(|v| !v.is_null()).map(input_hash),
        }
    }

    /// Runs inside a single flight: every caller for the key shares this
    /// result.
    async fn generate_and_settle(
        &self,
        request: FortuneRequest,
        key: FortuneKey,
        classification: Classification,
    ) -> Result<FortuneResponse, EngineError> {
        let user_id = request.user_id;
        let category = request.category.as_str();
        let now = self.now();

        // A flight that finished between our miss and our start may have
        // filled the cache.
        if let Some(hit) = self.resolver.resolve(&key, now).await {
            return Ok(FortuneResponse::hit(hit));
        }

        // Accounts open lazily here, after the rate limiter and cache, so
        // throttled and cached requests never touch the ledger.
        self.ledger
            .open_account(user_id, self.config.welcome_bonus)
            .await?;

        let reservation = match self
            .ledger
            .reserve(user_id, classification.token_cost, category)
            .await?
        {
            ReserveOutcome::Reserved(reservation) => reservation,
            ReserveOutcome::Insufficient { required, available } => {
                tracing::info!(%user_id, category, required, available, "Insufficient tokens");
                return Ok(FortuneResponse::rejected(
                    RejectReason::InsufficientTokens,
                    format!("This fortune costs {required} tokens; {available} available"),
                ));
            }
        };

        let date = local_date_string(now, self.config.utc_offset);
        let ctx = PromptContext {
            category,
            group: classification.group,
            profile: &request.profile,
            interactive_input: request.interactive_input.as_ref(),
            date: &date,
        };

        let generated = match tokio::time::timeout(
            self.config.generation_timeout,
            self.dispatcher.generate(user_id, &ctx),
        )
        .await
        {
            Ok(generated) => generated,
            Err(_) => {
                tracing::warn!(
                    %user_id,
                    category,
                    timeout_secs = self.config.generation_timeout.as_secs(),
                    "Generation timed out, serving fallback content"
                );
                fallback_generated(user_id, &ctx, 0)
            }
        };

        match generated.source {
            GenerationSource::Fresh => {
                let generated_at = self.now();
                let entry = CachedFortune {
                    payload: generated.payload.clone(),
                    group: classification.group,
                    generated_at,
                    expires_at: expires_at(classification.group, generated_at, self.config.utc_offset),
                };
                self.resolver.store(&key, &entry, generated_at).await;
                self.resolver
                    .append_history(&HistoryEntry {
                        user_id,
                        category: category.to_string(),
                        group: classification.group,
                        payload: entry.payload,
                        token_cost: reservation.amount,
                        model: generated.model.clone(),
                    })
                    .await;
                self.ledger.commit(&reservation).await;

                tracing::info!(
                    %user_id,
                    category,
                    tokens = reservation.amount,
                    attempts = generated.attempts,
                    total_tokens = generated.usage.total_tokens,
                    "Fortune generated"
                );
                Ok(FortuneResponse::generated(generated, generated_at, reservation.amount))
            }
            GenerationSource::Fallback => {
                self.ledger.refund(reservation, REFUND_REASON).await?;
                Ok(FortuneResponse::generated(generated, now, 0))
            }
        }
    }
}

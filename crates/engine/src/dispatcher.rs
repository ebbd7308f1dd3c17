//! Generation dispatcher: call the completion service with bounded retries
//! and degrade to deterministic fallback content when it cannot deliver.

use std::sync::Arc;
use std::time::Duration;

use fortune_completion::{Completion, CompletionError, CompletionRequest, CompletionService, Usage};
use fortune_core::category::classify_name;
use fortune_core::fallback::fallback_content;
use fortune_core::types::UserId;
use serde::{Deserialize, Serialize};

use crate::prompt::{build_batch_prompt, build_prompt, PromptContext};

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Linear backoff: the wait after attempt `n` is `base_delay * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Where generated content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationSource {
    Fresh,
    Fallback,
}

impl GenerationSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Generated {
    pub payload: serde_json::Value,
    pub source: GenerationSource,
    pub usage: Usage,
    pub model: Option<String>,
    /// Completion attempts made; zero when the service was never called.
    pub attempts: u32,
}

/// Deterministic placeholder for `ctx.category`.
pub fn fallback_generated(user_id: UserId, ctx: &PromptContext<'_>, attempts: u32) -> Generated {
    Generated {
        payload: fallback_content(
            ctx.category,
            ctx.group,
            ctx.profile.display_name(),
            ctx.date,
            &user_id.to_string(),
        ),
        source: GenerationSource::Fallback,
        usage: Usage::default(),
        model: None,
        attempts,
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Dispatcher {
    service: Arc<dyn CompletionService>,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(service: Arc<dyn CompletionService>, policy: RetryPolicy) -> Self {
        Self { service, policy }
    }

    /// Generate content for one category. Never fails: exhausted retries or
    /// a non-retryable error yield fallback content.
    pub async fn generate(&self, user_id: UserId, ctx: &PromptContext<'_>) -> Generated {
        let request = build_prompt(ctx);
        match self.complete_with_retry(&request, ctx.category).await {
            Ok((completion, attempts)) => Generated {
                payload: completion.content,
                source: GenerationSource::Fresh,
                usage: completion.usage,
                model: Some(completion.model),
                attempts,
            },
            Err((_, attempts)) => {
                tracing::warn!(%user_id, category = ctx.category, attempts, "Serving fallback content");
                fallback_generated(user_id, ctx, attempts)
            }
        }
    }

    /// Generate several categories with one completion call. Categories the
    /// reply omits, or every category if the call fails, get fallback content.
    pub async fn generate_batch(
        &self,
        user_id: UserId,
        categories: &[String],
        ctx: &PromptContext<'_>,
    ) -> Vec<(String, Generated)> {
        if categories.is_empty() {
            return Vec::new();
        }

        let request = build_batch_prompt(categories, ctx);
        let reply = self.complete_with_retry(&request, "batch").await.ok();

        categories
            .iter()
            .map(|category| {
                let group = classify_name(category).group;
                let cat_ctx = PromptContext {
                    category,
                    group,
                    ..*ctx
                };
                let fresh = reply.as_ref().and_then(|(completion, attempts)| {
                    completion
                        .content
                        .get(category)
                        .filter(|v| v.is_object())
                        .map(|payload| Generated {
                            payload: payload.clone(),
                            source: GenerationSource::Fresh,
                            usage: Usage::default(),
                            model: Some(completion.model.clone()),
                            attempts: *attempts,
                        })
                });
                let generated = fresh.unwrap_or_else(|| {
                    let attempts = reply.as_ref().map(|(_, a)| *a).unwrap_or(self.policy.max_attempts);
                    fallback_generated(user_id, &cat_ctx, attempts)
                });
                (category.clone(), generated)
            })
            .collect()
    }

    /// Run one request under the retry policy. On failure returns the last
    /// error with the number of attempts made.
    async fn complete_with_retry(
        &self,
        request: &CompletionRequest,
        category: &str,
    ) -> Result<(Completion, u32), (CompletionError, u32)> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.service.complete(request).await {
                Ok(completion) => return Ok((completion, attempt)),
                Err(e) if !e.is_retryable() => {
                    tracing::error!(category, attempt, error = %e, "Completion failed with non-retryable error");
                    return Err((e, attempt));
                }
                Err(e) if attempt >= max_attempts => {
                    tracing::error!(category, attempt, error = %e, "Completion failed after all retries");
                    return Err((e, attempt));
                }
                Err(e) => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        category,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Completion attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

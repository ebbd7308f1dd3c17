//! HTTP client for an OpenAI-compatible `chat/completions` endpoint.

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::CompletionConfig;
use crate::error::CompletionError;
use crate::messages::{
    ChatCompletionBody, ChatCompletionResponse, Completion, CompletionRequest, ErrorEnvelope,
    ResponseFormat,
};
use crate::service::CompletionService;

/// Error code the provider uses for billing exhaustion on a 429.
const INSUFFICIENT_QUOTA: &str = "insufficient_quota";

pub struct OpenAiClient {
    client: reqwest::Client,
    config: CompletionConfig,
}

impl OpenAiClient {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Build a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: CompletionConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_url)
    }

    // ---- private helpers ----

    /// Map a non-2xx response onto the error taxonomy.
    fn classify_failure(status: StatusCode, body: String) -> CompletionError {
        let envelope: ErrorEnvelope = serde_json::from_str(&body).unwrap_or_default();
        let code = envelope
            .error
            .code
            .as_ref()
            .and_then(|c| c.as_str())
            .unwrap_or_default();
        let kind = envelope.error.kind.as_deref().unwrap_or_default();
        let message = envelope.error.message.clone().unwrap_or_else(|| body.clone());

        match status.as_u16() {
            401 | 403 => CompletionError::Authentication(message),
            402 => CompletionError::QuotaExhausted(message),
            429 if code == INSUFFICIENT_QUOTA || kind == INSUFFICIENT_QUOTA => {
                CompletionError::QuotaExhausted(message)
            }
            429 => CompletionError::RateLimited(message),
            400 | 404 | 422 => CompletionError::InvalidRequest {
                status: status.as_u16(),
                body,
            },
            other => CompletionError::Server {
                status: other,
                body,
            },
        }
    }

    /// Pull the first choice out and parse it as a JSON object.
    fn parse_completion(
        response: ChatCompletionResponse,
        fallback_model: &str,
    ) -> Result<Completion, CompletionError> {
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionError::MalformedResponse("no choices in response".into()))?;

        let content: serde_json::Value = serde_json::from_str(text.trim())
            .map_err(|e| CompletionError::MalformedResponse(format!("content is not JSON: {e}")))?;
        if !content.is_object() {
            return Err(CompletionError::MalformedResponse(
                "content is not a JSON object".into(),
            ));
        }

        Ok(Completion {
            content,
            model: response.model.unwrap_or_else(|| fallback_model.to_string()),
            usage: response.usage.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(CompletionError::Authentication(
                "no API key configured".into(),
            ));
        };

        let body = ChatCompletionBody {
            model: &self.config.model,
            messages: &request.messages,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: self.config.temperature,
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::classify_failure(status, text));
        }

        let text = response.text().await?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

        let completion = Self::parse_completion(parsed, &self.config.model)?;
        tracing::debug!(
            model = %completion.model,
            total_tokens = completion.usage.total_tokens,
            "Completion succeeded"
        );
        Ok(completion)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

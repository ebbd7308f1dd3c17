use std::time::Duration;

/// Completion service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Base URL up to and including the API version, e.g. `https://api.openai.com/v1`.
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1500,
            temperature: 0.7,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl CompletionConfig {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional and fall back to [`Default`] values:
    ///
    /// | Env var                           | Default                       |
    /// |-----------------------------------|-------------------------------|
    /// | `COMPLETION_API_URL`              | `https://api.openai.com/v1`   |
    /// | `COMPLETION_API_KEY`              | unset                         |
    /// | `COMPLETION_MODEL`                | `gpt-4o-mini`                 |
    /// | `COMPLETION_MAX_TOKENS`           | `1500`                        |
    /// | `COMPLETION_TEMPERATURE`          | `0.7`                         |
    /// | `COMPLETION_REQUEST_TIMEOUT_SECS` | `30`                          |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_url = std::env::var("COMPLETION_API_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);

        let api_key = std::env::var("COMPLETION_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let model = std::env::var("COMPLETION_MODEL").unwrap_or(defaults.model);

        let max_tokens: u32 = std::env::var("COMPLETION_MAX_TOKENS")
            .unwrap_or_else(|_| defaults.max_tokens.to_string())
            .parse()
            .expect("COMPLETION_MAX_TOKENS must be a valid u32");

        let temperature: f32 = std::env::var("COMPLETION_TEMPERATURE")
            .unwrap_or_else(|_| defaults.temperature.to_string())
            .parse()
            .expect("COMPLETION_TEMPERATURE must be a valid f32");

        let timeout_secs: u64 = std::env::var("COMPLETION_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| defaults.request_timeout.as_secs().to_string())
            .parse()
            .expect("COMPLETION_REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            api_url,
            api_key,
            model,
            max_tokens,
            temperature,
            request_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

use std::time::Duration;

use fortune_core::error::CoreError;

use crate::auth::jwt::JwtConfig;

/// Default retention for expired fortunes before they are purged.
const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Default tokens granted per account per local day.
const DEFAULT_DAILY_BONUS_TOKENS: i64 = 3;

/// Time left inside the request timeout for settlement and the response
/// after generation gives up.
pub const RESPONSE_HEADROOM: Duration = Duration::from_secs(5);

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long background jobs get to stop after shutdown begins (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub jwt: JwtConfig,
    /// Shared secret for internal endpoints. Unset disables them.
    pub service_api_key: Option<String>,
    /// Unset disables the distributed tier and the shared rate-limit store.
    pub redis_url: Option<String>,
    pub retention_days: i64,
    /// `0` disables the daily grant job.
    pub daily_bonus_tokens: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                       |
    /// | `SERVICE_API_KEY`       | unset                      |
    /// | `REDIS_URL`             | unset                      |
    /// | `FORTUNE_RETENTION_DAYS`| `30`                       |
    /// | `DAILY_BONUS_TOKENS`    | `3`                        |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let service_api_key = non_empty_var("SERVICE_API_KEY");
        let redis_url = non_empty_var("REDIS_URL");

        let retention_days: i64 = std::env::var("FORTUNE_RETENTION_DAYS")
            .unwrap_or_else(|_| DEFAULT_RETENTION_DAYS.to_string())
            .parse()
            .expect("FORTUNE_RETENTION_DAYS must be a valid i64");

        let daily_bonus_tokens: i64 = std::env::var("DAILY_BONUS_TOKENS")
            .unwrap_or_else(|_| DEFAULT_DAILY_BONUS_TOKENS.to_string())
            .parse()
            .expect("DAILY_BONUS_TOKENS must be a valid i64");

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt,
            service_api_key,
            redis_url,
            retention_days,
            daily_bonus_tokens,
        }
    }
}

impl ServerConfig {
    /// Reject a generation bound that would let the HTTP timeout fire first.
    /// A request cut off there returns 408 instead of fallback content.
    pub fn check_generation_timeout(&self, generation_timeout: Duration) -> Result<(), CoreError> {
        let request_timeout = Duration::from_secs(self.request_timeout_secs);
        if generation_timeout + RESPONSE_HEADROOM > request_timeout {
            return Err(CoreError::Validation(format!(
                "generation timeout {}s plus {}s headroom exceeds the {}s request timeout",
                generation_timeout.as_secs(),
                RESPONSE_HEADROOM.as_secs(),
                self.request_timeout_secs,
            )));
        }
        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use fortune_engine::config::EngineConfig;

    use super::*;

    fn config_with_timeout(request_timeout_secs: u64) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: vec![],
            request_timeout_secs,
            shutdown_timeout_secs: 30,
            jwt: JwtConfig {
                secret: "test-secret".into(),
            },
            service_api_key: None,
            redis_url: None,
            retention_days: DEFAULT_RETENTION_DAYS,
            daily_bonus_tokens: DEFAULT_DAILY_BONUS_TOKENS,
        }
    }

    #[test]
    fn default_timeouts_are_consistent() {
        let config = config_with_timeout(30);
        assert!(config
            .check_generation_timeout(EngineConfig::default().generation_timeout)
            .is_ok());
    }

    #[test]
    fn generation_timeout_past_request_timeout_is_rejected() {
        let config = config_with_timeout(30);
        let err = config
            .check_generation_timeout(Duration::from_secs(45))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn generation_timeout_without_headroom_is_rejected() {
        let config = config_with_timeout(30);
        assert!(config.check_generation_timeout(Duration::from_secs(26)).is_err());
        assert!(config.check_generation_timeout(Duration::from_secs(25)).is_ok());
    }
}

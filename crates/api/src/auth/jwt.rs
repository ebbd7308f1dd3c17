//! HS256 access-token validation.
//!
//! The subject claim carries the user's UUID as issued by the identity
//! provider. [`generate_access_token`] exists for local tooling and tests.

use fortune_core::types::UserId;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Secret used when `JWT_SECRET` is unset outside production.
const DEV_SECRET: &str = "dev-only-fortune-secret-change-me";

/// JWT claims carried by every access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the user's UUID.
    pub sub: UserId,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret shared with the identity provider.
    pub secret: String,
}

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var      | Required                  | Default    |
    /// |--------------|---------------------------|------------|
    /// | `JWT_SECRET` | when `APP_ENV=production` | dev secret |
    ///
    /// # Panics
    ///
    /// Panics if `APP_ENV=production` and `JWT_SECRET` is unset or empty.
    pub fn from_env() -> Self {
        let production = std::env::var("APP_ENV").is_ok_and(|v| v == "production");
        let secret = match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                assert!(!production, "JWT_SECRET must be set in production");
                tracing::warn!("JWT_SECRET not set, using the development secret");
                DEV_SECRET.to_string()
            }
        };
        Self { secret }
    }
}

/// Sign an HS256 access token for `user_id` valid for `ttl_secs`.
pub fn generate_access_token(
    user_id: UserId,
    ttl_secs: i64,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        exp: now + ttl_secs,
        iat: now,
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Validate and decode an access token, returning the embedded [`Claims`].
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(), // HS256, validates exp
    )?;
    Ok(token_data.claims)
}

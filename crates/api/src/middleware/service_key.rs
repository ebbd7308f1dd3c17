//! Shared-secret extractor for service-to-service endpoints.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use fortune_core::error::CoreError;
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::state::AppState;

pub const SERVICE_KEY_HEADER: &str = "x-service-key";

/// Proof that the caller presented the configured `SERVICE_API_KEY`.
///
/// Rejects every request when no key is configured.
#[derive(Debug, Clone, Copy)]
pub struct ServiceKey;

impl FromRequestParts<AppState> for ServiceKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.service_api_key.as_deref() else {
            return Err(AppError::Core(CoreError::Forbidden(
                "Internal endpoints are disabled".into(),
            )));
        };

        let presented = parts
            .headers
            .get(SERVICE_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized("Missing x-service-key header".into()))
            })?;

        // Compare fixed-length digests, not the raw keys.
        if Sha256::digest(presented.as_bytes()) != Sha256::digest(expected.as_bytes()) {
            return Err(AppError::Core(CoreError::Unauthorized(
                "Invalid service key".into(),
            )));
        }

        Ok(ServiceKey)
    }
}

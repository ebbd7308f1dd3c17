/// Errors surfaced by the engine.
///
/// Rejections (`rate_limited`, `insufficient_tokens`) are ordinary response
/// values, not errors. Degraded cache tiers and best-effort writes are logged
/// and never reach this type.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The ledger could not durably record a charge or refund. Fatal for the
    /// request: nobody is charged without a record.
    #[error("Ledger write failed: {0}")]
    LedgerWriteFailed(String),

    /// A read from a store the request cannot proceed without.
    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<fortune_core::error::CoreError> for EngineError {
    fn from(err: fortune_core::error::CoreError) -> Self {
        use fortune_core::error::CoreError;
        match err {
            CoreError::Validation(msg) => Self::InvalidInput(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Failure of a single completion call.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// Credentials missing, invalid or lacking permission.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Billing or quota exhausted on the provider account.
    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    /// The provider rejected the request as malformed.
    #[error("Invalid request ({status}): {body}")]
    InvalidRequest { status: u16, body: String },

    /// Transient throttling.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Server error ({status}): {body}")]
    Server { status: u16, body: String },

    /// Network, DNS or TLS failure.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    /// The reply was not a JSON object where one was requested.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl CompletionError {
    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Authentication(_) | Self::QuotaExhausted(_) | Self::InvalidRequest { .. }
        )
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_set_is_not_retryable() {
        assert!(!CompletionError::Authentication("bad key".into()).is_retryable());
        assert!(!CompletionError::QuotaExhausted("billing".into()).is_retryable());
        assert!(!CompletionError::InvalidRequest {
            status: 400,
            body: String::new()
        }
        .is_retryable());
    }

    #[test]
    fn everything_else_is_retryable() {
        assert!(CompletionError::RateLimited("slow down".into()).is_retryable());
        assert!(CompletionError::Server {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(CompletionError::Transport("reset".into()).is_retryable());
        assert!(CompletionError::Timeout.is_retryable());
        assert!(CompletionError::MalformedResponse("not json".into()).is_retryable());
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

impl CacheError {
    /// Whether the error means the backend is unreachable rather than a bad
    /// command or payload.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Redis(err) => {
                err.is_io_error()
                    || err.is_connection_dropped()
                    || err.is_connection_refusal()
                    || err.is_timeout()
            }
        }
    }
}

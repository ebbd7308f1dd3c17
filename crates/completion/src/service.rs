use async_trait::async_trait;

use crate::error::CompletionError;
use crate::messages::{Completion, CompletionRequest};

/// A text-completion backend producing structured JSON replies.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Perform one completion attempt. Retrying is the caller's concern.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError>;

    /// Model identifier recorded alongside generated content.
    fn model(&self) -> &str;
}

//! Client for the external text-completion service.
//!
//! Speaks the OpenAI-compatible `chat/completions` protocol, requests JSON
//! object output, and classifies failures into retryable and non-retryable
//! [`CompletionError`]s. Callers depend on the [`CompletionService`] trait.

pub mod client;
pub mod config;
pub mod error;
pub mod messages;
pub mod service;

pub use client::OpenAiClient;
pub use config::CompletionConfig;
pub use error::CompletionError;
pub use messages::{ChatMessage, Completion, CompletionRequest, Usage};
pub use service::CompletionService;

//! Outbound completion client used by the fallback classifier.
//!
//! The classifier needs exactly one capability from the model-serving world:
//! a single bounded chat completion. The [`CompletionClient`] trait keeps
//! that seam narrow and substitutable; [`OpenAiCompatibleClient`] is the
//! shipped implementation for any `/v1/chat/completions` endpoint.

pub mod compatible;

pub use compatible::OpenAiCompatibleClient;

use async_trait::async_trait;

/// One completion request: a system prompt plus a single user message.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub model: &'a str,
    pub temperature: f64,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Issue one completion call and return the raw reply text.
    ///
    /// Implementations carry their own transport timeouts; callers add the
    /// request-level deadline on top.
    async fn complete(&self, request: CompletionRequest<'_>) -> anyhow::Result<String>;
}

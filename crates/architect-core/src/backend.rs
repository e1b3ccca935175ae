//! Chat backend abstraction.
//!
//! The pipeline only needs two things from an inference server: the list of
//! installed models and a single non-streaming chat completion. `OllamaClient`
//! is the production implementation; `fakes::ScriptedBackend` serves tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One message of a chat exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A language-model server reachable over request/response calls.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Model identifiers installed on the server.
    ///
    /// Fails with `CatalogUnavailable` on any transport, status or decoding
    /// problem. Callers that only want "whatever is there" should go through
    /// [`crate::catalog::list_models`], which degrades to an empty list.
    async fn try_list_models(&self) -> Result<Vec<String>>;

    /// Single-shot chat completion; returns the assistant message content.
    ///
    /// Fails with `GenerationFailure`. No retries.
    async fn chat(&self, model: &str, messages: &[ChatMessage], temperature: f32)
        -> Result<String>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

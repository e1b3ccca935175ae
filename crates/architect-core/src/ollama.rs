//! Ollama HTTP client
//!
//! Talks to a local Ollama server through its native endpoints:
//! `GET /api/tags` for the model catalog and `POST /api/chat` for generation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{ChatBackend, ChatMessage};
use crate::config::OllamaConfig;
use crate::error::{ArchitectError, Result};

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Ollama client for catalog and chat calls
pub struct OllamaClient {
    config: OllamaConfig,
    http_client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("mermaid-architect/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ArchitectError::InvalidConfig(format!("http client: {e}")))?;

        Ok(OllamaClient {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(OllamaConfig::from_env())
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }
}

#[async_trait]
impl ChatBackend for OllamaClient {
    async fn try_list_models(&self) -> Result<Vec<String>> {
        let url = self.config.tags_url();
        let response = self
            .http_client
            .get(&url)
            .timeout(self.config.catalog_timeout())
            .send()
            .await
            .map_err(|e| ArchitectError::CatalogUnavailable(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArchitectError::CatalogUnavailable(format!(
                "{url} returned {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ArchitectError::CatalogUnavailable(format!("{url}: {e}")))?;
        let tags: TagsResponse = serde_json::from_str(&body).map_err(|e| {
            ArchitectError::CatalogUnavailable(format!("malformed /api/tags body: {e}"))
        })?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String> {
        let url = self.config.chat_url();
        let payload = ChatRequest {
            model,
            messages,
            stream: false,
            options: ChatOptions { temperature },
        };

        debug!(url = %url, model = %model, "posting chat request");
        let response = self
            .http_client
            .post(&url)
            .json(&payload)
            .timeout(self.config.generation_timeout())
            .send()
            .await
            .map_err(|e| {
                ArchitectError::GenerationFailure(format!(
                    "failed to reach Ollama at {url} (is it running?): {e}"
                ))
            })?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ArchitectError::GenerationFailure(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            ArchitectError::GenerationFailure(format!("malformed /api/chat body: {e}"))
        })?;
        Ok(parsed.message.content)
    }

    fn describe(&self) -> String {
        format!("ollama({})", self.config.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_wire_shape() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let payload = ChatRequest {
            model: "llama3",
            messages: &messages,
            stream: false,
            options: ChatOptions { temperature: 0.1 },
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["model"], "llama3");
        assert_eq!(value["stream"], false);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hi");
        assert!(value["options"]["temperature"].is_number());
    }

    #[test]
    fn test_tags_response_tolerates_missing_models() {
        let tags: TagsResponse = serde_json::from_str("{}").unwrap();
        assert!(tags.models.is_empty());

        let tags: TagsResponse =
            serde_json::from_str(r#"{"models":[{"name":"llama3:latest","size":1}]}"#).unwrap();
        assert_eq!(tags.models[0].name, "llama3:latest");
    }

    #[test]
    fn test_chat_response_requires_content() {
        assert!(serde_json::from_str::<ChatResponse>(r#"{"message":{}}"#).is_err());
        assert!(serde_json::from_str::<ChatResponse>(r#"{"done":true}"#).is_err());
        let ok: ChatResponse =
            serde_json::from_str(r#"{"message":{"role":"assistant","content":"graph TD"}}"#)
                .unwrap();
        assert_eq!(ok.message.content, "graph TD");
    }

    #[test]
    fn test_describe_names_the_host() {
        let client = OllamaClient::new(OllamaConfig::new("localhost:11434")).unwrap();
        assert_eq!(client.describe(), "ollama(http://localhost:11434)");
    }
}

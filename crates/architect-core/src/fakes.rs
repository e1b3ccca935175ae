//! In-memory fakes for the chat backend (testing only)
//!
//! `ScriptedBackend` replays canned replies in order and records every chat
//! call it receives, so pipeline behaviour can be exercised without a running
//! Ollama server.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::{ChatBackend, ChatMessage};
use crate::error::{ArchitectError, Result};

/// A chat call captured by [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedChat {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

/// Backend that answers from a script.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    /// `None` simulates an unreachable server.
    models: Option<Vec<String>>,
    replies: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<Vec<RecordedChat>>,
}

impl ScriptedBackend {
    /// Backend whose catalog is unreachable and whose script is empty.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_models(mut self, models: &[&str]) -> Self {
        self.models = Some(models.iter().map(|m| m.to_string()).collect());
        self
    }

    /// Queue the next chat reply.
    pub fn with_reply(self, reply: Result<String>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Chat calls received so far.
    pub fn calls(&self) -> Vec<RecordedChat> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn try_list_models(&self) -> Result<Vec<String>> {
        self.models.clone().ok_or_else(|| {
            ArchitectError::CatalogUnavailable("scripted backend is offline".to_string())
        })
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(RecordedChat {
            model: model.to_string(),
            messages: messages.to_vec(),
            temperature,
        });
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(ArchitectError::GenerationFailure(
                "scripted backend has no reply queued".to_string(),
            ))
        })
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

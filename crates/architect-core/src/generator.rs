//! Prompt-to-markup generation.

use std::sync::OnceLock;
use std::time::Instant;

use regex::Regex;

use crate::backend::{ChatBackend, ChatMessage};
use crate::diagram::{DiagramSource, GenerationRequest};
use crate::error::{ArchitectError, Result};
use crate::obs::{emit_generation_finished, emit_generation_started};

/// Instruction sent ahead of every user prompt.
pub const SYSTEM_PROMPT: &str = "You are a Mermaid Diagram Generator. \
Output ONLY valid Mermaid code. \
Do not include explanations or markdown ticks. \
Start with 'graph TD' or 'flowchart LR'. \
Use simple ASCII characters for node IDs.";

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)```[a-z0-9_+\-]*[ \t]*\r?\n(.*?)\r?\n[ \t]*```")
            .expect("fenced block pattern is valid")
    })
}

/// Body of the first fenced code block, or the whole text when there is none.
pub fn extract_fenced_block(text: &str) -> &str {
    fenced_block_re()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
}

/// The two-message exchange sent for a request.
pub fn build_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(request.prompt.as_str()),
    ]
}

/// Ask the model for a diagram and clean its answer.
///
/// One attempt only; the caller decides whether to resubmit.
pub async fn generate<B: ChatBackend + ?Sized>(
    backend: &B,
    request: &GenerationRequest,
    temperature: f32,
) -> Result<DiagramSource> {
    if request.prompt.trim().is_empty() {
        return Err(ArchitectError::GenerationFailure(
            "prompt is empty".to_string(),
        ));
    }
    if request.model.trim().is_empty() {
        return Err(ArchitectError::GenerationFailure(
            "no model selected".to_string(),
        ));
    }

    emit_generation_started(&request.model, request.prompt.len());
    let start = Instant::now();

    let result = async {
        let raw = backend
            .chat(&request.model, &build_messages(request), temperature)
            .await?;
        match DiagramSource::from_text(extract_fenced_block(raw.trim())) {
            Ok(source) => Ok(source),
            Err(ArchitectError::EmptySource) => Err(ArchitectError::GenerationFailure(
                "model returned no diagram markup".to_string(),
            )),
            Err(other) => Err(other),
        }
    }
    .await;

    emit_generation_finished(
        &request.model,
        start.elapsed().as_millis() as u64,
        result.is_ok(),
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedBackend;

    #[test]
    fn test_extract_fenced_block_first_match_only() {
        let text = "Sure!\n```mermaid\ngraph TD\nA-->B\n```\nand\n```mermaid\ngraph LR\n```";
        assert_eq!(extract_fenced_block(text), "graph TD\nA-->B");
    }

    #[test]
    fn test_extract_fenced_block_case_and_tag() {
        let text = "```Mermaid\r\nflowchart LR\r\nX-->Y\r\n```";
        assert_eq!(extract_fenced_block(text), "flowchart LR\r\nX-->Y");
        let text = "```\ngraph TD\n```";
        assert_eq!(extract_fenced_block(text), "graph TD");
    }

    #[test]
    fn test_extract_without_fence_returns_input() {
        assert_eq!(extract_fenced_block("graph TD\nA-->B"), "graph TD\nA-->B");
    }

    #[test]
    fn test_build_messages() {
        let messages = build_messages(&GenerationRequest::new("login flow", "llama3"));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, SYSTEM_PROMPT);
        assert_eq!(messages[1], ChatMessage::user("login flow"));
    }

    #[tokio::test]
    async fn test_generate_extracts_and_sanitizes() {
        let backend = ScriptedBackend::new().with_reply(Ok(
            "Here is your chart:\n```mermaid\ngraph TD\n  A[Start]B-->C\n```\nDone.".to_string(),
        ));
        let request = GenerationRequest::new("a chart", "llama3");

        let source = generate(&backend, &request, 0.1).await.unwrap();
        assert_eq!(source.as_str(), "graph TD\nA[Start]\nB-->C");

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "llama3");
        assert_eq!(calls[0].messages[1].content, "a chart");
    }

    #[tokio::test]
    async fn test_generate_propagates_backend_failure_without_retry() {
        let backend = ScriptedBackend::new().with_reply(Err(ArchitectError::GenerationFailure(
            "Ollama returned 500 Internal Server Error: boom".to_string(),
        )));
        let request = GenerationRequest::new("a chart", "llama3");

        let err = generate(&backend, &request, 0.1).await.unwrap_err();
        assert!(matches!(err, ArchitectError::GenerationFailure(ref m) if m.contains("boom")));
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_answer() {
        let backend = ScriptedBackend::new().with_reply(Ok("```mermaid\n\n```".to_string()));
        let request = GenerationRequest::new("a chart", "llama3");

        let err = generate(&backend, &request, 0.1).await.unwrap_err();
        assert!(matches!(err, ArchitectError::GenerationFailure(_)));
    }

    #[tokio::test]
    async fn test_generate_rejects_blank_prompt_before_calling_backend() {
        let backend = ScriptedBackend::new();
        let request = GenerationRequest::new("   ", "llama3");

        assert!(generate(&backend, &request, 0.1).await.is_err());
        assert!(backend.calls().is_empty());
    }
}

//! services/api/src/adapters/generation_llm.rs
//!
//! This module contains the adapter for the section-content LLM.
//! It implements the `TextGenerationService` port from the `core` crate.

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use newsletter_core::ports::{PortError, PortResult, TextGenerationService};

const SYSTEM_INSTRUCTIONS: &str = "You are a newsletter writer for a terpene and cannabis \
research publication. You receive instructions for one newsletter section, sometimes with a \
CONTEXT DATA block of JSON records. Write the section body as engaging, factual prose. Ground \
your writing in the context data when it is provided; do not invent citations. Respond with \
the body text only, no heading and no markdown.";

//=========================================================================================
// The OpenAI-backed Adapter
//=========================================================================================

/// An adapter that implements `TextGenerationService` using an OpenAI-compatible LLM.
///
/// Every call is bounded by `timeout`; an elapsed timeout surfaces as a port
/// error so the composer falls back to the section placeholder.
#[derive(Clone)]
pub struct OpenAiGenerationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiGenerationAdapter {
    /// Creates a new `OpenAiGenerationAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String, timeout: Duration) -> Self {
        Self {
            client,
            model,
            timeout,
        }
    }
}

#[async_trait]
impl TextGenerationService for OpenAiGenerationAdapter {
    async fn generate(&self, instructions: &str) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(instructions)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API with a bounded timeout, and manually map the error if
        // it occurs, which respects the orphan rule.
        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                PortError::Unexpected(format!(
                    "text generation timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        // Extract the text content from the first choice in the response.
        if let Some(choice) = response.choices.into_iter().next() {
            if let Some(content) = choice.message.content {
                Ok(content)
            } else {
                Err(PortError::Unexpected(
                    "Generation LLM response contained no text content.".to_string(),
                ))
            }
        } else {
            Err(PortError::Unexpected(
                "Generation LLM returned no choices in its response.".to_string(),
            ))
        }
    }
}

//=========================================================================================
// The Offline Adapter
//=========================================================================================

/// Deterministic fallback used when no API key is configured. Produces a short
/// readable summary of the instructions so every section still renders.
#[derive(Clone, Default)]
pub struct OfflineGenerationAdapter;

#[async_trait]
impl TextGenerationService for OfflineGenerationAdapter {
    async fn generate(&self, instructions: &str) -> PortResult<String> {
        let topic = instructions.lines().next().unwrap_or("").trim();
        if topic.is_empty() {
            return Err(PortError::Unexpected(
                "no instructions provided".to_string(),
            ));
        }
        Ok(format!(
            "{topic} (Automated content generation is not configured; this draft text was \
produced offline and should be replaced before publication.)"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_adapter_is_deterministic_and_non_empty() {
        let adapter = OfflineGenerationAdapter;
        let a = adapter.generate("Summarize the week.\nmore").await.unwrap();
        let b = adapter.generate("Summarize the week.\nmore").await.unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("Summarize the week."));
    }
}

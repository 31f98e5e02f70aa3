//! Adapters bridging rig-core models to the crate's provider traits.

use async_trait::async_trait;
use rig::completion::CompletionModel;
use rig::embeddings::EmbeddingModel;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, Embedder, LlmProvider, Role};

/// Wraps a rig `CompletionModel` as an `LlmProvider`.
pub struct RigAdapter<M: CompletionModel> {
    model: M,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

#[async_trait]
impl<M: CompletionModel> LlmProvider for RigAdapter<M> {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let temperature = request.temperature;
        let (preamble, history, prompt) = split_request(request)?;

        let mut builder = self.model.completion_request(rig::completion::Message::user(prompt));
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = temperature {
            builder = builder.temperature(temperature);
        }
        if !history.is_empty() {
            builder = builder.messages(history);
        }
        let response = builder.send().await.map_err(|e| LlmError::RequestFailed {
            provider: self.model_name.clone(),
            reason: e.to_string(),
        })?;

        let text: String = response
            .choice
            .into_iter()
            .filter_map(|content| match content {
                rig::completion::AssistantContent::Text(t) => Some(t.text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.model_name.clone(),
                reason: "Empty completion".to_string(),
            });
        }
        Ok(text)
    }
}

/// Split our message list into (preamble, history, final user prompt).
fn split_request(
    request: CompletionRequest,
) -> Result<(Option<String>, Vec<rig::completion::Message>, String), LlmError> {
    let mut preamble = None;
    let mut history = Vec::new();
    let mut prompt = None;

    let count = request.messages.len();
    for (i, message) in request.messages.into_iter().enumerate() {
        match message.role {
            Role::System => {
                // rig carries the system prompt separately; concatenate if
                // more than one shows up.
                match &mut preamble {
                    None => preamble = Some(message.content),
                    Some(existing) => {
                        *existing = format!("{}\n\n{}", existing, message.content);
                    }
                }
            }
            Role::User if i == count - 1 => prompt = Some(message.content),
            Role::User => history.push(rig::completion::Message::user(message.content)),
            Role::Assistant => {
                history.push(rig::completion::Message::assistant(message.content));
            }
        }
    }

    let prompt = prompt.ok_or_else(|| LlmError::InvalidResponse {
        provider: "request".to_string(),
        reason: "Completion request must end with a user message".to_string(),
    })?;
    Ok((preamble, history, prompt))
}

/// Wraps a rig `EmbeddingModel` as an `Embedder`.
pub struct RigEmbedder<M: EmbeddingModel> {
    model: M,
}

impl<M: EmbeddingModel> RigEmbedder<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }
}

#[async_trait]
impl<M: EmbeddingModel> Embedder for RigEmbedder<M> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let embedding = self
            .model
            .embed_text(text)
            .await
            .map_err(|e| LlmError::EmbeddingFailed {
                reason: e.to_string(),
            })?;
        Ok(embedding.vec.into_iter().map(|v| v as f32).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ChatMessage;

    #[test]
    fn split_request_orders_parts() {
        let request = CompletionRequest::new(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::user("how are you"),
        ]);
        let (preamble, history, prompt) = split_request(request).unwrap();
        assert_eq!(preamble.as_deref(), Some("be brief"));
        assert_eq!(history.len(), 2);
        assert_eq!(prompt, "how are you");
    }

    #[test]
    fn split_request_requires_trailing_user_message() {
        let request = CompletionRequest::new(vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
        ]);
        assert!(split_request(request).is_err());
    }
}

//! Provider-agnostic LLM and embedding traits.
//!
//! The workflow only ever talks to `LlmProvider` and `Embedder`; the rig-core
//! adapters live in `rig_adapter.rs`. Tests substitute scripted
//! implementations of these traits.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::LlmError;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A completion request.
///
/// The final message must be a user message; earlier messages are passed as
/// chat history. A leading system message becomes the preamble.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
        }
    }

    /// Single-turn request with a system prompt and one user message.
    pub fn prompt(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self::new(vec![ChatMessage::system(system), ChatMessage::user(user)])
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Generate a free-text completion.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;

    /// Generate a completion constrained to a JSON object matching `schema`.
    ///
    /// The default implementation appends formatting instructions to the
    /// request, completes, and parses the first JSON object in the reply.
    async fn extract_value(
        &self,
        mut request: CompletionRequest,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, LlmError> {
        let instructions = format!(
            "\n\nRespond with ONLY a JSON object matching this schema, no prose:\n{}",
            serde_json::to_string_pretty(schema)?
        );
        if let Some(last) = request.messages.last_mut() {
            last.content.push_str(&instructions);
        }
        let raw = self.complete(request).await?;
        parse_json_reply(&raw)
    }
}

/// Extract a typed value from the provider.
pub async fn extract_as<T: DeserializeOwned>(
    provider: &dyn LlmProvider,
    request: CompletionRequest,
    schema: &serde_json::Value,
) -> Result<T, LlmError> {
    let value = provider.extract_value(request, schema).await?;
    serde_json::from_value(value).map_err(|e| LlmError::ExtractionFailed {
        reason: format!("Response did not match expected shape: {}", e),
    })
}

/// Parse the first JSON object or array out of a model reply.
///
/// Models frequently wrap JSON in markdown fences or lead with a sentence;
/// scan for the outermost bracket pair and parse that slice.
pub(crate) fn parse_json_reply(raw: &str) -> Result<serde_json::Value, LlmError> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if start < end {
                if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                    return Ok(value);
                }
            }
        }
    }
    Err(LlmError::ExtractionFailed {
        reason: format!(
            "No parseable JSON in model reply ({} chars)",
            trimmed.len()
        ),
    })
}

/// Trait for text embedding backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single piece of text into a dense vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

/// Cosine similarity between two vectors. Returns 0.0 on dimension mismatch
/// or zero-magnitude input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Deterministic offline embedder.
///
/// Hashes word tokens into a fixed number of buckets and L2-normalizes. Not a
/// semantic embedding, but stable across runs, which is what local setups and
/// tests need when no embeddings API is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMS: usize = 256;

    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    fn dims(&self) -> usize {
        if self.dims == 0 {
            Self::DEFAULT_DIMS
        } else {
            self.dims
        }
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        use std::hash::{Hash, Hasher};

        let dims = self.dims();
        let mut vec = vec![0.0f32; dims];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = std::hash::DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();
            let bucket = (h % dims as u64) as usize;
            // Second hash bit picks the sign so buckets cancel rather than
            // saturate.
            let sign = if (h >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            vec[bucket] += sign;
        }
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vec {
                *v /= norm;
            }
        }
        Ok(vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_json_reply_plain() {
        let value = parse_json_reply(r#"{"a": 1}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn parse_json_reply_fenced() {
        let value = parse_json_reply("Here you go:\n```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn parse_json_reply_array() {
        let value = parse_json_reply("Sure: [1, 2, 3]").unwrap();
        assert_eq!(value.as_array().unwrap().len(), 3);
    }

    #[test]
    fn parse_json_reply_garbage_errors() {
        assert!(parse_json_reply("no json here").is_err());
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn hashing_embedder_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("toddler tantrum at bedtime").await.unwrap();
        let b = embedder.embed("toddler tantrum at bedtime").await.unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn hashing_embedder_overlap_scores_higher() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("tantrum at bedtime").await.unwrap();
        let b = embedder.embed("bedtime tantrum screaming").await.unwrap();
        let c = embedder.embed("quarterly tax filing deadline").await.unwrap();
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }
}

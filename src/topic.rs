//! Topic detection: decides whether a message opens a new concern that
//! warrants a fresh interview, or continues the current one.
//!
//! First message in a conversation always opens a topic. A fixed phrase list
//! gives a fast lexical path; otherwise an LLM classifies against recent
//! turns. Classification failure is treated as continuation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::llm::{extract_as, ChatMessage, CompletionRequest, LlmProvider, Role};

/// Minimum classifier confidence required to act on a new-topic call.
pub const NEW_TOPIC_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Phrases that explicitly introduce a new concern.
const NEW_TOPIC_INDICATORS: &[&str] = &[
    "another thing",
    "different issue",
    "also wanted to ask",
    "separate concern",
    "unrelated but",
    "different topic",
    "new problem",
    "something else",
    "on a different note",
    "changing subject",
    "while we're at it",
    "also struggling with",
    "another concern",
    "besides that",
    "apart from that",
];

const DETECTION_PROMPT: &str = "Analyze whether this message introduces a NEW behavioral \
concern or is a continuation of the existing conversation topic.\n\n\
INDICATORS OF A NEW TOPIC:\n\
- Different child behavior than discussed before\n\
- New concern introduced with phrases like \"also\", \"another thing\", \"different issue\"\n\
- Shift from one behavioral domain to another (e.g., sleep -> eating -> social)\n\
- Explicit introduction of new problem\n\n\
NOT A NEW TOPIC (these are continuations):\n\
- Follow-up questions about the current topic\n\
- Clarifications or additional details about the same concern\n\
- Responses to earlier questions\n\
- Simple acknowledgments or thank yous\n\
- Asking for more advice on the same topic";

/// Outcome of topic detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicDetection {
    pub is_new_topic: bool,
    /// Brief summary of the topic, 2-5 words.
    pub topic_summary: String,
    pub confidence: f64,
    pub reasoning: String,
}

impl TopicDetection {
    /// Whether the detection is confident enough to start a new interview.
    pub fn opens_new_topic(&self) -> bool {
        self.is_new_topic && self.confidence >= NEW_TOPIC_CONFIDENCE_THRESHOLD
    }
}

/// A prior conversation turn, for classifier context.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

pub struct TopicDetector {
    provider: Arc<dyn LlmProvider>,
    /// How many recent turns the classifier sees.
    context_window: usize,
}

impl TopicDetector {
    pub fn new(provider: Arc<dyn LlmProvider>, context_window: usize) -> Self {
        Self {
            provider,
            context_window,
        }
    }

    /// Classify a message against the conversation so far.
    pub async fn detect(
        &self,
        message: &str,
        recent_turns: &[Turn],
        current_topic_summary: Option<&str>,
    ) -> TopicDetection {
        if recent_turns.is_empty() {
            return TopicDetection {
                is_new_topic: true,
                topic_summary: extract_topic_summary(message),
                confidence: 1.0,
                reasoning: "New conversation - no previous context".to_string(),
            };
        }

        let message_lower = message.to_lowercase();
        for indicator in NEW_TOPIC_INDICATORS {
            if message_lower.contains(indicator) {
                tracing::debug!(indicator, "Explicit new-topic phrase found");
                return TopicDetection {
                    is_new_topic: true,
                    topic_summary: extract_topic_summary(message),
                    confidence: 0.9,
                    reasoning: format!("Explicit indicator: '{}'", indicator),
                };
            }
        }

        match self
            .llm_detect(message, recent_turns, current_topic_summary)
            .await
        {
            Ok(detection) => detection,
            Err(e) => {
                tracing::warn!(error = %e, "Topic classification failed; treating as continuation");
                TopicDetection {
                    is_new_topic: false,
                    topic_summary: current_topic_summary.unwrap_or_default().to_string(),
                    confidence: 0.0,
                    reasoning: "Classification unavailable".to_string(),
                }
            }
        }
    }

    async fn llm_detect(
        &self,
        message: &str,
        recent_turns: &[Turn],
        current_topic_summary: Option<&str>,
    ) -> Result<TopicDetection, crate::error::LlmError> {
        let start = recent_turns.len().saturating_sub(self.context_window);
        let mut history = String::new();
        for turn in &recent_turns[start..] {
            let speaker = match turn.role {
                Role::User => "Parent",
                _ => "Assistant",
            };
            let content: String = turn.content.chars().take(200).collect();
            history.push_str(&format!("{}: {}\n", speaker, content));
        }

        let user_prompt = format!(
            "CONVERSATION HISTORY (recent messages):\n{}\n\
             CURRENT TOPIC BEING DISCUSSED:\n{}\n\n\
             NEW MESSAGE TO ANALYZE:\n{}",
            if history.is_empty() {
                "No previous messages.".to_string()
            } else {
                history
            },
            current_topic_summary.unwrap_or("Not yet determined."),
            message
        );

        let schema = json!({
            "type": "object",
            "properties": {
                "is_new_topic": { "type": "boolean" },
                "topic_summary": { "type": "string", "description": "2-5 words" },
                "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                "reasoning": { "type": "string" }
            },
            "required": ["is_new_topic", "topic_summary", "confidence", "reasoning"]
        });

        let request = CompletionRequest::new(vec![
            ChatMessage::system(DETECTION_PROMPT),
            ChatMessage::user(user_prompt),
        ])
        .with_temperature(0.0);

        extract_as::<TopicDetection>(self.provider.as_ref(), request, &schema).await
    }
}

/// First sentence, truncated to five words.
pub fn extract_topic_summary(message: &str) -> String {
    let first_sentence = message.split('.').next().unwrap_or("").trim();
    let words: Vec<&str> = first_sentence.split_whitespace().collect();
    if words.len() <= 5 {
        first_sentence.to_string()
    } else {
        format!("{}...", words[..5].join(" "))
    }
}

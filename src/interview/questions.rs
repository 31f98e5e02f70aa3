//! Question planning for the two interview rounds.
//!
//! Each round is generated once up front as a question plan; the orchestrator
//! then asks the questions one by one. Generation failure falls back to fixed
//! question sets so the interview can always proceed.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::llm::{extract_as, CompletionRequest, LlmProvider};
use crate::workflow::state::QuestionAnswer;

const PHASE1_MIN_QUESTIONS: usize = 2;
const PHASE1_MAX_QUESTIONS: usize = 5;
const PHASE2_MIN_QUESTIONS: usize = 1;
const PHASE2_MAX_QUESTIONS: usize = 3;

pub const PHASE1_FALLBACK_QUESTIONS: [&str; 3] = [
    "How long has this been happening?",
    "How often does this occur?",
    "Can you describe a typical situation when this occurs?",
];

pub const PHASE2_FALLBACK_QUESTIONS: [&str; 2] = [
    "Is there anything else you think is important for me to know?",
    "What outcome are you hoping for? What would success look like for you?",
];

const PHASE1_SYSTEM_PROMPT: &str = "You are a compassionate child behavioral guidance \
assistant gathering information to better understand a parent's situation.\n\n\
Given the parent's initial concern, determine how many questions (2-5) are needed to gather \
essential context and generate those questions.\n\n\
Questions should be:\n\
- Simple and clear\n\
- Non-clinical in tone (avoid jargon)\n\
- Open-ended to encourage detailed responses\n\
- Empathetic and non-judgmental\n\n\
Key areas to cover (as relevant): duration, frequency, triggers, context, impact on the \
family, previous attempts, and the child's age if not provided.\n\n\
IMPORTANT:\n\
- DO NOT ask too many questions - parents are stressed. Focus on essentials.\n\
- If the child's age is not provided, make that your first question.\n\
- Tailor questions to the specific concern mentioned.";

const PHASE2_SYSTEM_PROMPT: &str = "You are a compassionate child behavioral guidance \
assistant conducting a follow-up interview.\n\n\
You have received initial answers from a parent about their child's behavioral concern. \
Generate 1-3 targeted follow-up questions.\n\n\
Focus on:\n\
- Clarifying vague or incomplete answers\n\
- Getting specific examples\n\
- Understanding emotional impact on child and family\n\
- Exploring potential triggers or patterns not yet covered\n\
- Safety concerns if any signals were detected\n\
- What the parent hopes to achieve\n\n\
IMPORTANT:\n\
- Don't repeat questions that were already asked\n\
- If the initial answers were comprehensive, fewer follow-ups are fine\n\
- Look for red flags that need immediate attention";

#[derive(Debug, Deserialize)]
struct QuestionPlanReply {
    questions: Vec<String>,
    #[serde(default)]
    reasoning: String,
}

fn plan_schema(min: usize, max: usize) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "questions": {
                "type": "array",
                "items": { "type": "string" },
                "minItems": min,
                "maxItems": max
            },
            "reasoning": { "type": "string" }
        },
        "required": ["questions", "reasoning"]
    })
}

pub struct QuestionPlanner {
    provider: Arc<dyn LlmProvider>,
}

impl QuestionPlanner {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Plan the first interview round from the initial concern.
    pub async fn plan_phase1(&self, concern: &str, child_age: Option<u8>) -> Vec<String> {
        let age_line = match child_age {
            Some(age) => format!("{} years old", age),
            None => "Not provided (please ask)".to_string(),
        };
        let user_prompt = format!(
            "Parent's concern: \"{}\"\n\nChild's age: {}\n\n\
             Generate appropriate questions to better understand this situation.",
            concern, age_line
        );
        let request = CompletionRequest::prompt(PHASE1_SYSTEM_PROMPT, user_prompt);
        let schema = plan_schema(PHASE1_MIN_QUESTIONS, PHASE1_MAX_QUESTIONS);

        match extract_as::<QuestionPlanReply>(self.provider.as_ref(), request, &schema).await {
            Ok(reply) if !reply.questions.is_empty() => {
                tracing::debug!(reasoning = %reply.reasoning, "Planned first-round questions");
                clamp_questions(reply.questions, PHASE1_MAX_QUESTIONS)
            }
            Ok(_) => {
                tracing::warn!("Question plan came back empty; using defaults");
                fallback(&PHASE1_FALLBACK_QUESTIONS)
            }
            Err(e) => {
                tracing::warn!(error = %e, "First-round question generation failed; using defaults");
                fallback(&PHASE1_FALLBACK_QUESTIONS)
            }
        }
    }

    /// Plan the follow-up round from all first-round answers.
    pub async fn plan_phase2(&self, concern: &str, phase1: &[QuestionAnswer]) -> Vec<String> {
        let transcript = format_transcript(phase1);
        let user_prompt = format!(
            "Parent's original concern: \"{}\"\n\nInitial interview answers:\n{}\n\n\
             Generate follow-up questions.",
            concern, transcript
        );
        let request = CompletionRequest::prompt(PHASE2_SYSTEM_PROMPT, user_prompt);
        let schema = plan_schema(PHASE2_MIN_QUESTIONS, PHASE2_MAX_QUESTIONS);

        match extract_as::<QuestionPlanReply>(self.provider.as_ref(), request, &schema).await {
            Ok(reply) if !reply.questions.is_empty() => {
                clamp_questions(reply.questions, PHASE2_MAX_QUESTIONS)
            }
            Ok(_) => fallback(&PHASE2_FALLBACK_QUESTIONS),
            Err(e) => {
                tracing::warn!(error = %e, "Follow-up question generation failed; using defaults");
                fallback(&PHASE2_FALLBACK_QUESTIONS)
            }
        }
    }
}

fn clamp_questions(mut questions: Vec<String>, max: usize) -> Vec<String> {
    questions.truncate(max);
    questions
}

fn fallback(defaults: &[&str]) -> Vec<String> {
    defaults.iter().map(|q| q.to_string()).collect()
}

pub(crate) fn format_transcript(qa: &[QuestionAnswer]) -> String {
    qa.iter()
        .map(|entry| {
            format!(
                "Q: {}\nA: {}",
                entry.question,
                entry.answer.as_deref().unwrap_or("(no answer)")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

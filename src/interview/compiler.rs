//! Knowledge compilation: turns the interview transcript into a structured
//! summary the analysis stages consume.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::interview::questions::format_transcript;
use crate::llm::{extract_as, CompletionRequest, LlmProvider};
use crate::workflow::state::QuestionAnswer;

/// Structured information about the child.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChildDetails {
    pub age: Option<u8>,
    pub developmental_stage: Option<String>,
    pub relevant_history: Option<String>,
}

/// Context about the behavioral situation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SituationContext {
    pub duration: Option<String>,
    pub frequency: Option<String>,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub settings: Vec<String>,
    pub previous_attempts: Option<String>,
}

/// Everything the interview learned, in the shape analysis stages expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatheredKnowledge {
    /// The parent's original concern, refined.
    pub initial_concern: String,
    #[serde(default)]
    pub child_details: ChildDetails,
    #[serde(default)]
    pub situation_context: SituationContext,
    #[serde(default)]
    pub severity_indicators: Vec<String>,
    #[serde(default)]
    pub parent_goals: String,
    pub key_insights: String,
    #[serde(default)]
    pub recommended_focus_areas: Vec<String>,
    /// Full interview transcript, kept for reference.
    #[serde(default)]
    pub raw_qa: Vec<QuestionAnswer>,
}

const SYSTEM_PROMPT: &str = "You are a clinical data analyst for a child behavioral guidance \
team.\n\n\
Take the raw interview data from a parent and compile it into structured, actionable \
information. Extract and organize:\n\n\
1. CHILD DETAILS: age, developmental considerations, relevant history\n\
2. SITUATION CONTEXT: duration, frequency, triggers, settings, previous attempts\n\
3. SEVERITY INDICATORS: red flags, urgency, safety concerns\n\
4. PARENT GOALS: what outcome the parent hopes for\n\
5. KEY INSIGHTS: the most important information, with patterns connected\n\
6. RECOMMENDED FOCUS AREAS: what the analysis should focus on\n\n\
Be thorough but concise. Focus on extracting actionable information.";

pub struct KnowledgeCompiler {
    provider: Arc<dyn LlmProvider>,
}

impl KnowledgeCompiler {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Compile the full interview into structured knowledge.
    ///
    /// Never fails: on extraction error the raw transcript is wrapped in a
    /// minimal record so downstream stages always have something to read.
    pub async fn compile(
        &self,
        initial_concern: &str,
        child_age: Option<u8>,
        phase1: &[QuestionAnswer],
        phase2: &[QuestionAnswer],
    ) -> GatheredKnowledge {
        let mut all_qa: Vec<QuestionAnswer> = phase1.to_vec();
        all_qa.extend(phase2.iter().cloned());

        let age_line = match child_age {
            Some(age) => format!("{} years old", age),
            None => "Not in profile".to_string(),
        };
        let user_prompt = format!(
            "Parent's initial concern: \"{}\"\n\nChild's age from profile: {}\n\n\
             Complete interview transcript:\n{}\n\n\
             Please compile this information into a structured format.",
            initial_concern,
            age_line,
            format_transcript(&all_qa)
        );

        let schema = json!({
            "type": "object",
            "properties": {
                "initial_concern": { "type": "string" },
                "child_details": {
                    "type": "object",
                    "properties": {
                        "age": { "type": ["integer", "null"] },
                        "developmental_stage": { "type": ["string", "null"] },
                        "relevant_history": { "type": ["string", "null"] }
                    }
                },
                "situation_context": {
                    "type": "object",
                    "properties": {
                        "duration": { "type": ["string", "null"] },
                        "frequency": { "type": ["string", "null"] },
                        "triggers": { "type": "array", "items": { "type": "string" } },
                        "settings": { "type": "array", "items": { "type": "string" } },
                        "previous_attempts": { "type": ["string", "null"] }
                    }
                },
                "severity_indicators": { "type": "array", "items": { "type": "string" } },
                "parent_goals": { "type": "string" },
                "key_insights": { "type": "string" },
                "recommended_focus_areas": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["initial_concern", "key_insights"]
        });

        let request = CompletionRequest::prompt(SYSTEM_PROMPT, user_prompt);
        match extract_as::<GatheredKnowledge>(self.provider.as_ref(), request, &schema).await {
            Ok(mut knowledge) => {
                tracing::info!(
                    severity_indicators = knowledge.severity_indicators.len(),
                    focus_areas = ?knowledge.recommended_focus_areas,
                    "Interview compiled"
                );
                knowledge.raw_qa = all_qa;
                knowledge
            }
            Err(e) => {
                tracing::warn!(error = %e, "Knowledge compilation failed; wrapping raw transcript");
                GatheredKnowledge {
                    initial_concern: initial_concern.to_string(),
                    child_details: ChildDetails {
                        age: child_age,
                        ..Default::default()
                    },
                    situation_context: SituationContext::default(),
                    severity_indicators: Vec::new(),
                    parent_goals: String::new(),
                    key_insights: "Compilation error - using raw interview data".to_string(),
                    recommended_focus_areas: Vec::new(),
                    raw_qa: all_qa,
                }
            }
        }
    }
}

impl GatheredKnowledge {
    /// Render for inclusion in analysis prompts.
    pub fn as_prompt_context(&self) -> String {
        let mut out = format!("Concern: {}\n", self.initial_concern);
        if let Some(age) = self.child_details.age {
            out.push_str(&format!("Child age: {}\n", age));
        }
        if let Some(stage) = &self.child_details.developmental_stage {
            out.push_str(&format!("Developmental stage: {}\n", stage));
        }
        if let Some(duration) = &self.situation_context.duration {
            out.push_str(&format!("Duration: {}\n", duration));
        }
        if let Some(frequency) = &self.situation_context.frequency {
            out.push_str(&format!("Frequency: {}\n", frequency));
        }
        if !self.situation_context.triggers.is_empty() {
            out.push_str(&format!(
                "Triggers: {}\n",
                self.situation_context.triggers.join(", ")
            ));
        }
        if !self.situation_context.settings.is_empty() {
            out.push_str(&format!(
                "Settings: {}\n",
                self.situation_context.settings.join(", ")
            ));
        }
        if let Some(attempts) = &self.situation_context.previous_attempts {
            out.push_str(&format!("Previous attempts: {}\n", attempts));
        }
        if !self.severity_indicators.is_empty() {
            out.push_str(&format!(
                "Severity indicators: {}\n",
                self.severity_indicators.join(", ")
            ));
        }
        if !self.parent_goals.is_empty() {
            out.push_str(&format!("Parent goals: {}\n", self.parent_goals));
        }
        out.push_str(&format!("Key insights: {}\n", self.key_insights));
        out
    }

    /// Keywords for lens scoring, drawn from concern, insights, and triggers.
    pub fn concern_keywords(&self) -> Vec<String> {
        let mut text = format!("{} {}", self.initial_concern, self.key_insights);
        for trigger in &self.situation_context.triggers {
            text.push(' ');
            text.push_str(trigger);
        }
        for area in &self.recommended_focus_areas {
            text.push(' ');
            text.push_str(area);
        }
        let mut keywords: Vec<String> = Vec::new();
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
        {
            // Crude singularization so "tantrums" still hits "tantrum".
            let word = word.strip_suffix('s').unwrap_or(word);
            if !keywords.iter().any(|k| k == word) {
                keywords.push(word.to_string());
            }
        }
        keywords
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::error::LlmError;

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
            Err(LlmError::RequestFailed {
                provider: "failing".to_string(),
                reason: "down".to_string(),
            })
        }
    }

    struct FixedProvider(String);

    #[async_trait]
    impl LlmProvider for FixedProvider {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
            Ok(self.0.clone())
        }
    }

    fn qa(question: &str, answer: &str) -> QuestionAnswer {
        QuestionAnswer {
            question: question.to_string(),
            answer: Some(answer.to_string()),
            question_number: 1,
            asked_at: Utc::now(),
            answered_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn compile_failure_produces_fallback_record() {
        let compiler = KnowledgeCompiler::new(Arc::new(FailingProvider));
        let phase1 = vec![qa("How long?", "Two weeks")];
        let knowledge = compiler
            .compile("won't share toys", Some(4), &phase1, &[])
            .await;
        assert_eq!(knowledge.initial_concern, "won't share toys");
        assert_eq!(knowledge.child_details.age, Some(4));
        assert_eq!(
            knowledge.key_insights,
            "Compilation error - using raw interview data"
        );
        assert_eq!(knowledge.raw_qa.len(), 1);
    }

    #[tokio::test]
    async fn compile_success_keeps_transcript() {
        let reply = r#"{
            "initial_concern": "sharing difficulties at preschool",
            "child_details": { "age": 4, "developmental_stage": "preoperational", "relevant_history": null },
            "situation_context": { "duration": "two weeks", "frequency": "daily", "triggers": ["group play"], "settings": ["preschool"], "previous_attempts": null },
            "severity_indicators": [],
            "parent_goals": "peaceful playdates",
            "key_insights": "age-typical egocentrism",
            "recommended_focus_areas": ["sharing routines"]
        }"#;
        let compiler = KnowledgeCompiler::new(Arc::new(FixedProvider(reply.to_string())));
        let knowledge = compiler
            .compile("won't share toys", Some(4), &[qa("How long?", "Two weeks")], &[])
            .await;
        assert_eq!(knowledge.situation_context.duration.as_deref(), Some("two weeks"));
        assert_eq!(knowledge.raw_qa.len(), 1);
    }

    #[test]
    fn concern_keywords_dedupe_and_singularize() {
        let knowledge = GatheredKnowledge {
            initial_concern: "Daily tantrums and more tantrums".to_string(),
            child_details: ChildDetails::default(),
            situation_context: SituationContext::default(),
            severity_indicators: vec![],
            parent_goals: String::new(),
            key_insights: "reward charts may help".to_string(),
            recommended_focus_areas: vec![],
            raw_qa: vec![],
        };
        let keywords = knowledge.concern_keywords();
        assert!(keywords.contains(&"tantrum".to_string()));
        assert!(keywords.contains(&"reward".to_string()));
        assert_eq!(
            keywords.iter().filter(|k| *k == "tantrum").count(),
            1
        );
    }
}

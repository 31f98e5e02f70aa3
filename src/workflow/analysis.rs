//! Analysis stages: emotion parsing, routing, history analysis, resource
//! recommendation, perspective, and synthesis.
//!
//! Every LLM-backed stage degrades to `None` on failure; synthesis always
//! produces text, falling back to a fixed apology.

use std::sync::Arc;

use crate::config::RetryPolicy;
use crate::interview::GatheredKnowledge;
use crate::llm::{retry::with_retry, CompletionRequest, LlmProvider};
use crate::memory::{MemoryManager, Trend};
use crate::skills::{applicable_skills, skill_by_name, SkillScore};
use uuid::Uuid;

/// Synthesis fallback when the LLM is unavailable.
pub const SYNTHESIS_FALLBACK: &str = "I apologize, but I'm having trouble processing your \
message right now. Please try again in a moment, or rephrase your question. Your concern is \
important to me.";

/// Final fallback when no response text exists at all.
pub const OUTPUT_FALLBACK: &str =
    "I apologize, but I encountered an issue processing your message. Please try again.";

const EMOTION_TABLE: &[(&str, &[&str])] = &[
    ("worried", &["worried", "concerned", "anxious", "scared"]),
    ("frustrated", &["frustrated", "annoyed", "tired", "exhausted"]),
    ("confused", &["confused", "don't know", "not sure", "help"]),
    ("calm", &["just wondering", "curious", "question"]),
];

/// Coarse emotional read of the parent's message. First matching category
/// wins; default is neutral.
pub fn detect_emotion(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    for (emotion, keywords) in EMOTION_TABLE {
        if keywords.iter().any(|k| lower.contains(k)) {
            return emotion;
        }
    }
    "neutral"
}

/// Which analysis agents to run for this concern.
#[derive(Debug, Clone)]
pub struct Route {
    pub active_skills: Vec<SkillScore>,
    pub agents_to_call: Vec<&'static str>,
}

/// Score lenses against the gathered knowledge and pick agents.
pub fn route(knowledge: &GatheredKnowledge, child_age: Option<u8>) -> Route {
    let keywords = knowledge.concern_keywords();
    let age = child_age.or(knowledge.child_details.age).unwrap_or(0);
    let active_skills = applicable_skills(&keywords, age);

    let mut agents_to_call = vec!["behavior_analyst", "material_consultant"];
    if !active_skills.is_empty() {
        agents_to_call.push("psychological_perspective");
    }

    Route {
        active_skills,
        agents_to_call,
    }
}

pub struct AnalysisEngine {
    provider: Arc<dyn LlmProvider>,
    memory: Arc<MemoryManager>,
    retry: RetryPolicy,
    days_back: i64,
}

impl AnalysisEngine {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        memory: Arc<MemoryManager>,
        retry: RetryPolicy,
        days_back: i64,
    ) -> Self {
        Self {
            provider,
            memory,
            retry,
            days_back,
        }
    }

    async fn complete(&self, op: &str, request: CompletionRequest) -> Option<String> {
        let result = with_retry(&self.retry, op, || {
            self.provider.complete(request.clone())
        })
        .await;
        match result {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(op, error = %e, "Analysis stage unavailable");
                None
            }
        }
    }

    /// Analyze the child's behavioral history against the current concern.
    pub async fn analyze_patterns(
        &self,
        child_id: Uuid,
        knowledge: &GatheredKnowledge,
    ) -> Option<String> {
        let mut history = String::new();

        match self
            .memory
            .temporal_pattern_analysis(child_id, &knowledge.initial_concern, self.days_back)
            .await
        {
            Ok(analysis) if analysis.trend != Trend::InsufficientData => {
                history.push_str(&format!(
                    "Trend over the last {} days: {} ({} matching observations)\n",
                    analysis.days_analyzed,
                    analysis.trend.as_str(),
                    analysis.total_matching
                ));
                for (frequency, count) in &analysis.frequency_histogram {
                    history.push_str(&format!("- {}: {} observations\n", frequency, count));
                }
            }
            Ok(_) => history.push_str("Not enough history for a trend.\n"),
            Err(e) => {
                tracing::warn!(error = %e, "Temporal analysis unavailable");
            }
        }

        match self
            .memory
            .search_similar_patterns(child_id, &knowledge.initial_concern, 5)
            .await
        {
            Ok(similar) if !similar.is_empty() => {
                history.push_str("Similar past observations:\n");
                for stored in similar {
                    if let crate::memory::MemoryRecord::BehavioralPattern(p) = stored.record {
                        history.push_str(&format!(
                            "- {} ({}, {}), context: {}\n",
                            p.behavior, p.frequency, p.severity, p.context
                        ));
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Similar-pattern search unavailable");
            }
        }

        let prompt = format!(
            "You are a behavior analyst reviewing a child's history.\n\n\
             Current situation:\n{}\n\
             Behavioral history:\n{}\n\
             Provide a brief analysis (2-3 paragraphs): is this behavior recurring or new, \
             is it trending up or down, and what patterns connect past and present?",
            knowledge.as_prompt_context(),
            if history.is_empty() {
                "No recorded history for this child.".to_string()
            } else {
                history
            }
        );

        self.complete(
            "pattern_analysis",
            CompletionRequest::prompt("You analyze child behavioral history.", prompt),
        )
        .await
    }

    /// Recommend resources and strategies, informed by what worked before.
    pub async fn recommend_resources(
        &self,
        child_id: Uuid,
        knowledge: &GatheredKnowledge,
    ) -> Option<String> {
        let mut past = String::new();
        match self
            .memory
            .search_relevant_interventions(child_id, &knowledge.initial_concern, 3)
            .await
        {
            Ok(interventions) if !interventions.is_empty() => {
                past.push_str("Strategies that worked for this child before:\n");
                for i in interventions {
                    past.push_str(&format!(
                        "- {} (for: {}, effectiveness: {}): {}\n",
                        i.strategy, i.issue_addressed, i.effectiveness, i.outcome
                    ));
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Intervention recall unavailable");
            }
        }

        let prompt = format!(
            "Recommend practical resources for a parent: books, activities, and concrete \
             strategies.\n\n\
             Situation:\n{}\n{}\
             Give 2-3 specific, actionable recommendations with a one-line rationale each.",
            knowledge.as_prompt_context(),
            past
        );

        self.complete(
            "material_consultant",
            CompletionRequest::prompt("You recommend parenting resources.", prompt),
        )
        .await
    }

    /// Theoretical analysis through the active lenses. Consumes the pattern
    /// analysis when it exists.
    pub async fn apply_perspective(
        &self,
        knowledge: &GatheredKnowledge,
        active_skills: &[SkillScore],
        pattern_analysis: Option<&str>,
    ) -> Option<String> {
        if active_skills.is_empty() {
            return None;
        }

        let mut frameworks = String::new();
        for score in active_skills {
            if let Some(profile) = skill_by_name(score.name) {
                frameworks.push_str(&format!(
                    "## {}\n{}\n\n",
                    profile.name, profile.perspective_prompt
                ));
            }
        }

        let prompt = format!(
            "Based on the following psychological frameworks, analyze this situation:\n\n\
             Situation:\n{}\n\
             Behavior Analysis: {}\n\n\
             {}\n\
             Provide a brief analysis (3-4 paragraphs) using the most relevant framework(s): \
             why the behavior is occurring, whether it is developmentally normal, and the key \
             theoretical insights.",
            knowledge.as_prompt_context(),
            pattern_analysis.unwrap_or("Not available"),
            frameworks
        );

        self.complete(
            "psychological_perspective",
            CompletionRequest::prompt("You apply psychological frameworks.", prompt),
        )
        .await
    }

    /// Synthesize all stage outputs into the parent-facing response.
    pub async fn synthesize(
        &self,
        knowledge: &GatheredKnowledge,
        emotional_state: &str,
        pattern_analysis: Option<&str>,
        perspective: Option<&str>,
        recommendations: Option<&str>,
    ) -> String {
        let prompt = format!(
            "You are an empathetic child behavioral guidance assistant. Synthesize the \
             following into a warm, supportive, actionable response for the parent.\n\n\
             Parent's Emotional State: {}\n\
             Situation:\n{}\n\
             ANALYSIS RESULTS:\n\
             ------------------------------------------------------------\n\
             Behavior Analysis:\n{}\n\n\
             Psychological Perspective:\n{}\n\n\
             Resource Recommendations:\n{}\n\
             ------------------------------------------------------------\n\n\
             The response should:\n\
             1. Acknowledge the parent's concern with empathy\n\
             2. Normalize the behavior if it is age-appropriate\n\
             3. Reference the child's history when relevant\n\
             4. Explain the psychological perspective in parent-friendly language\n\
             5. Provide 2-3 actionable recommendations\n\
             6. End with encouragement and next steps\n\n\
             Keep the tone warm and empowering. Use \"your child\" instead of clinical terms. \
             Aim for 4-6 paragraphs.",
            emotional_state,
            knowledge.as_prompt_context(),
            pattern_analysis.unwrap_or("No historical analysis available"),
            perspective.unwrap_or("No theoretical analysis available"),
            recommendations.unwrap_or("No recommendations available"),
        );

        self.complete(
            "synthesize_response",
            CompletionRequest::prompt("You write parent-facing guidance.", prompt),
        )
        .await
        .unwrap_or_else(|| SYNTHESIS_FALLBACK.to_string())
    }
}

/// Behavior verbs looked for when writing memory back after a run.
const BEHAVIOR_VERBS: &[&str] = &[
    "hitting", "biting", "screaming", "crying", "refusing", "tantrum", "yelling", "throwing",
    "breaking", "pushing",
];

const TRIGGER_WORDS: &[&str] = &["when", "after", "before", "during", "because"];

/// Extracted behavior signals for memory write-back.
#[derive(Debug, Clone, Default)]
pub struct BehaviorSignals {
    pub behavior: Option<String>,
    /// Short context snippets around trigger words, at most three.
    pub triggers: Vec<String>,
}

/// Keyword-level extraction of behavior and trigger context from a concern.
pub fn extract_behavior_signals(text: &str) -> BehaviorSignals {
    let lower = text.to_lowercase();

    let behavior = BEHAVIOR_VERBS
        .iter()
        .find(|verb| lower.contains(*verb))
        .map(|verb| verb.to_string());

    let mut triggers = Vec::new();
    for word in TRIGGER_WORDS {
        if let Some(idx) = lower.find(word) {
            let start = idx.saturating_sub(20);
            let end = (idx + 50).min(text.len());
            // Snap to char boundaries for multi-byte text.
            let start = (0..=start).rev().find(|i| text.is_char_boundary(*i)).unwrap_or(0);
            let end = (end..=text.len()).find(|i| text.is_char_boundary(*i)).unwrap_or(text.len());
            triggers.push(text[start..end].trim().to_string());
            if triggers.len() == 3 {
                break;
            }
        }
    }

    BehaviorSignals { behavior, triggers }
}

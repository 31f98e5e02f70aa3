//! Persisted workflow state.
//!
//! The pipeline never relies on suspended call frames: everything needed to
//! resume lives in one serializable `WorkflowState` snapshot per thread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::interview::GatheredKnowledge;
use crate::safety::{Recommendation, SafetyFlag};

/// Interview progress for a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewPhase {
    NotStarted,
    Phase1,
    Phase2,
    Complete,
}

/// Who said a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One message in the conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A question asked during the interview, with its eventual answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub question: String,
    pub answer: Option<String>,
    /// 1-based ordinal within the phase.
    pub question_number: usize,
    pub asked_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
}

impl QuestionAnswer {
    pub fn new(question: impl Into<String>, question_number: usize) -> Self {
        Self {
            question: question.into(),
            answer: None,
            question_number,
            asked_at: Utc::now(),
            answered_at: None,
        }
    }

    pub fn record_answer(&mut self, answer: impl Into<String>) {
        self.answer = Some(answer.into());
        self.answered_at = Some(Utc::now());
    }
}

/// What a suspended thread is waiting for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingSuspension {
    /// Waiting on the parent's answer to an interview question.
    Question {
        phase: InterviewPhase,
        question_number: usize,
    },
    /// Waiting on a human reviewer's decision about held content.
    Review {
        content: String,
        flags: Vec<SafetyFlag>,
        recommendation: Recommendation,
    },
}

impl PendingSuspension {
    pub fn kind(&self) -> &'static str {
        match self {
            PendingSuspension::Question { .. } => "question",
            PendingSuspension::Review { .. } => "review",
        }
    }
}

/// Complete snapshot of one conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub thread_id: Uuid,
    pub child_id: Uuid,
    pub child_age: Option<u8>,
    pub conversation_id: Uuid,
    pub messages: Vec<ConversationMessage>,

    pub phase: InterviewPhase,
    pub initial_concern: String,
    pub topic_summary: Option<String>,
    pub phase1_questions: Vec<QuestionAnswer>,
    pub phase1_index: usize,
    pub phase2_questions: Vec<QuestionAnswer>,
    pub phase2_index: usize,
    pub gathered_knowledge: Option<GatheredKnowledge>,

    pub parent_emotional_state: String,
    pub active_skills: Vec<String>,
    pub agents_called: Vec<String>,
    pub pattern_analysis: Option<String>,
    pub perspective: Option<String>,
    pub recommendations: Option<String>,

    pub synthesized_response: Option<String>,
    pub filtered_response: Option<String>,
    pub final_response: Option<String>,
    pub safety_flags: Vec<SafetyFlag>,
    pub requires_human_review: bool,

    pub pending: Option<PendingSuspension>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(thread_id: Uuid, child_id: Uuid, child_age: Option<u8>, conversation_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            thread_id,
            child_id,
            child_age,
            conversation_id,
            messages: Vec::new(),
            phase: InterviewPhase::NotStarted,
            initial_concern: String::new(),
            topic_summary: None,
            phase1_questions: Vec::new(),
            phase1_index: 0,
            phase2_questions: Vec::new(),
            phase2_index: 0,
            gathered_knowledge: None,
            parent_emotional_state: "neutral".to_string(),
            active_skills: Vec::new(),
            agents_called: Vec::new(),
            pattern_analysis: None,
            perspective: None,
            recommendations: None,
            synthesized_response: None,
            filtered_response: None,
            final_response: None,
            safety_flags: Vec::new(),
            requires_human_review: false,
            pending: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reset interview and analysis fields for a fresh topic, keeping the
    /// conversation log.
    pub fn start_new_topic(&mut self, concern: &str, topic_summary: String) {
        self.phase = InterviewPhase::NotStarted;
        self.initial_concern = concern.to_string();
        self.topic_summary = Some(topic_summary);
        self.phase1_questions.clear();
        self.phase1_index = 0;
        self.phase2_questions.clear();
        self.phase2_index = 0;
        self.gathered_knowledge = None;
        self.active_skills.clear();
        self.agents_called.clear();
        self.pattern_analysis = None;
        self.perspective = None;
        self.recommendations = None;
        self.synthesized_response = None;
        self.filtered_response = None;
        self.final_response = None;
        self.safety_flags.clear();
        self.requires_human_review = false;
        self.pending = None;
    }

    /// Check structural invariants before acting on a loaded snapshot.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        let violation = |message: String| WorkflowError::InvariantViolation {
            thread_id: self.thread_id,
            message,
        };

        if self.phase1_index > self.phase1_questions.len() {
            return Err(violation(format!(
                "phase 1 cursor {} past question count {}",
                self.phase1_index,
                self.phase1_questions.len()
            )));
        }
        if self.phase2_index > self.phase2_questions.len() {
            return Err(violation(format!(
                "phase 2 cursor {} past question count {}",
                self.phase2_index,
                self.phase2_questions.len()
            )));
        }
        if (self.phase == InterviewPhase::Complete) != self.gathered_knowledge.is_some() {
            return Err(violation(
                "gathered knowledge must exist exactly when the interview is complete"
                    .to_string(),
            ));
        }
        if !self.phase2_questions.is_empty()
            && self.phase1_questions.iter().any(|qa| qa.answer.is_none())
        {
            return Err(violation(
                "follow-up questions generated before phase 1 was fully answered".to_string(),
            ));
        }
        if let Some(PendingSuspension::Question { phase, .. }) = &self.pending {
            let questions = match phase {
                InterviewPhase::Phase1 => &self.phase1_questions,
                InterviewPhase::Phase2 => &self.phase2_questions,
                _ => {
                    return Err(violation(
                        "question suspension outside an interview phase".to_string(),
                    ));
                }
            };
            if questions.is_empty() {
                return Err(violation(
                    "question suspension with an empty question list".to_string(),
                ));
            }
        }
        for qa in self.phase1_questions.iter().chain(&self.phase2_questions) {
            if qa.answer.is_some() != qa.answered_at.is_some() {
                return Err(violation(
                    "answer text and answer timestamp must be set together".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Recent turns formatted for the topic detector.
    pub fn recent_turns(&self) -> Vec<crate::topic::Turn> {
        self.messages
            .iter()
            .map(|m| crate::topic::Turn {
                role: match m.role {
                    MessageRole::User => crate::llm::Role::User,
                    MessageRole::Assistant => crate::llm::Role::Assistant,
                },
                content: m.content.clone(),
            })
            .collect()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> WorkflowState {
        WorkflowState::new(Uuid::new_v4(), Uuid::new_v4(), Some(4), Uuid::new_v4())
    }

    #[test]
    fn fresh_state_is_valid() {
        assert!(state().validate().is_ok());
    }

    #[test]
    fn cursor_past_question_count_is_invalid() {
        let mut s = state();
        s.phase = InterviewPhase::Phase1;
        s.phase1_questions = vec![QuestionAnswer::new("How long?", 1)];
        s.phase1_index = 2;
        assert!(matches!(
            s.validate(),
            Err(WorkflowError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn complete_phase_requires_knowledge() {
        let mut s = state();
        s.phase = InterviewPhase::Complete;
        assert!(s.validate().is_err());
    }

    #[test]
    fn phase2_before_phase1_answered_is_invalid() {
        let mut s = state();
        s.phase = InterviewPhase::Phase2;
        s.phase1_questions = vec![QuestionAnswer::new("How long?", 1)];
        s.phase2_questions = vec![QuestionAnswer::new("Anything else?", 1)];
        assert!(s.validate().is_err());
    }

    #[test]
    fn question_suspension_needs_questions() {
        let mut s = state();
        s.phase = InterviewPhase::Phase1;
        s.pending = Some(PendingSuspension::Question {
            phase: InterviewPhase::Phase1,
            question_number: 1,
        });
        assert!(s.validate().is_err());
    }

    #[test]
    fn new_topic_clears_analysis_but_keeps_log() {
        let mut s = state();
        s.messages.push(ConversationMessage::user("hi"));
        s.pattern_analysis = Some("old".to_string());
        s.phase = InterviewPhase::Complete;
        s.start_new_topic("new concern", "new concern".to_string());
        assert_eq!(s.phase, InterviewPhase::NotStarted);
        assert!(s.pattern_analysis.is_none());
        assert_eq!(s.messages.len(), 1);
    }

    #[test]
    fn serde_round_trip() {
        let mut s = state();
        s.phase = InterviewPhase::Phase1;
        s.phase1_questions = vec![QuestionAnswer::new("How long?", 1)];
        s.pending = Some(PendingSuspension::Question {
            phase: InterviewPhase::Phase1,
            question_number: 1,
        });
        let json = serde_json::to_string(&s).unwrap();
        let back: WorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.thread_id, s.thread_id);
        assert!(matches!(
            back.pending,
            Some(PendingSuspension::Question { .. })
        ));
    }
}

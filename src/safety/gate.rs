//! Safety gate: combined detection over user message and draft response,
//! disclaimer injection, and human review decisions.

use serde::{Deserialize, Serialize};

use crate::safety::disclaimers::{format_with_disclaimers, REJECTION_MESSAGE};
use crate::safety::triggers::{
    assess_severity, detect_sensitive_content, Recommendation, SafetyFlag, Severity,
};

/// Combined assessment of a draft response in the context of the user message.
#[derive(Debug, Clone, Serialize)]
pub struct SafetyAssessment {
    /// Draft response with disclaimers already appended.
    pub filtered_content: String,
    /// Union of flags from the user message and the draft response.
    pub flags: Vec<SafetyFlag>,
    pub severity: Severity,
    pub requires_review: bool,
    pub recommendation: Recommendation,
    pub matched_terms: Vec<String>,
}

/// A human reviewer's decision on a held response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Deliver the held content as-is (disclaimers included).
    Approve,
    /// Deliver reviewer-provided content instead.
    Edit { edited_content: String },
    /// Withhold the content and deliver the fixed referral message.
    Reject { reason: Option<String> },
}

impl ReviewDecision {
    pub fn kind(&self) -> &'static str {
        match self {
            ReviewDecision::Approve => "approve",
            ReviewDecision::Edit { .. } => "edit",
            ReviewDecision::Reject { .. } => "reject",
        }
    }
}

/// Assess a draft response together with the user message that prompted it.
///
/// Flags are the union over both texts; severity is re-derived from the
/// union so a flagged user message escalates a clean draft.
pub fn evaluate(content: &str, user_message: &str) -> SafetyAssessment {
    let response_detection = detect_sensitive_content(content);
    let user_detection = if user_message.is_empty() {
        None
    } else {
        Some(detect_sensitive_content(user_message))
    };

    let mut flags = response_detection.flags.clone();
    let mut matched_terms = response_detection.matched_terms.clone();
    if let Some(user) = &user_detection {
        for flag in &user.flags {
            if !flags.contains(flag) {
                flags.push(*flag);
            }
        }
        for term in &user.matched_terms {
            if !matched_terms.contains(term) {
                matched_terms.push(term.clone());
            }
        }
    }

    let (severity, requires_review, recommendation) = assess_severity(&flags);
    let filtered_content = format_with_disclaimers(content, &flags);

    if requires_review {
        tracing::info!(
            severity = severity.as_str(),
            flags = ?flags,
            "Response flagged for review"
        );
    }

    SafetyAssessment {
        filtered_content,
        flags,
        severity,
        requires_review,
        recommendation,
        matched_terms,
    }
}

/// Resolve held content according to a reviewer decision.
pub fn apply_decision(held_content: &str, decision: &ReviewDecision) -> String {
    match decision {
        ReviewDecision::Approve => held_content.to_string(),
        ReviewDecision::Edit { edited_content } => edited_content.clone(),
        ReviewDecision::Reject { reason } => match reason {
            Some(reason) if !reason.is_empty() => {
                format!("{}\n\n**Review Note:** {}", REJECTION_MESSAGE, reason)
            }
            _ => REJECTION_MESSAGE.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benign_exchange_passes_unmodified() {
        let assessment = evaluate(
            "Try a consistent bedtime routine.",
            "My toddler resists bedtime",
        );
        assert_eq!(assessment.severity, Severity::Safe);
        assert!(!assessment.requires_review);
        assert_eq!(assessment.filtered_content, "Try a consistent bedtime routine.");
    }

    #[test]
    fn user_message_flags_escalate_clean_draft() {
        let assessment = evaluate(
            "Consistency helps with this.",
            "He keeps hitting his sister, is that abuse?",
        );
        assert_eq!(assessment.severity, Severity::Critical);
        assert!(assessment.requires_review);
        assert!(assessment.flags.contains(&SafetyFlag::Harm));
        assert!(assessment.filtered_content.contains("EMERGENCY NOTICE"));
    }

    #[test]
    fn draft_flags_detected_without_user_context() {
        let assessment = evaluate("You might ask a psychologist about this.", "");
        assert_eq!(assessment.severity, Severity::Moderate);
        assert!(assessment
            .filtered_content
            .contains("**Important Disclaimer:**"));
    }

    #[test]
    fn approve_keeps_held_content() {
        assert_eq!(
            apply_decision("held text", &ReviewDecision::Approve),
            "held text"
        );
    }

    #[test]
    fn edit_replaces_content() {
        let decision = ReviewDecision::Edit {
            edited_content: "softer wording".to_string(),
        };
        assert_eq!(apply_decision("held text", &decision), "softer wording");
    }

    #[test]
    fn reject_substitutes_referral_message() {
        let decision = ReviewDecision::Reject { reason: None };
        let result = apply_decision("held text", &decision);
        assert!(result.contains("qualified professional"));
        assert!(!result.contains("held text"));
    }

    #[test]
    fn reject_with_reason_appends_note() {
        let decision = ReviewDecision::Reject {
            reason: Some("too specific".to_string()),
        };
        let result = apply_decision("held text", &decision);
        assert!(result.contains("**Review Note:** too specific"));
    }
}

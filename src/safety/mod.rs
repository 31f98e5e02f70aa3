//! Safety gate: trigger detection, disclaimer injection, human review.

pub mod disclaimers;
pub mod gate;
pub mod triggers;

pub use disclaimers::{disclaimers_for_flags, format_with_disclaimers, REJECTION_MESSAGE};
pub use gate::{apply_decision, evaluate, ReviewDecision, SafetyAssessment};
pub use triggers::{detect_sensitive_content, Detection, Recommendation, SafetyFlag, Severity};

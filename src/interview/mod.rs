//! Two-round interview: question planning and knowledge compilation.

pub mod compiler;
pub mod questions;

pub use compiler::{ChildDetails, GatheredKnowledge, KnowledgeCompiler, SituationContext};
pub use questions::{
    QuestionPlanner, PHASE1_FALLBACK_QUESTIONS, PHASE2_FALLBACK_QUESTIONS,
};

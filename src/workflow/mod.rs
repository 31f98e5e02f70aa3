//! Resumable workflow: persisted state machine, checkpoints, analysis
//! pipeline, and the orchestrator tying them together.

pub mod analysis;
pub mod checkpoint;
pub mod orchestrator;
pub mod state;

pub use analysis::{detect_emotion, AnalysisEngine, OUTPUT_FALLBACK, SYNTHESIS_FALLBACK};
pub use checkpoint::{CheckpointStore, LibSqlCheckpointStore};
pub use orchestrator::{
    ChildContext, CompletedRun, Orchestrator, ResumeInput, RunOutcome, Suspension,
};
pub use state::{
    ConversationMessage, InterviewPhase, MessageRole, PendingSuspension, QuestionAnswer,
    WorkflowState,
};

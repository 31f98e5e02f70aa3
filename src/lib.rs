//! Parent Assist: a resumable conversational pipeline for child behavioral
//! guidance.
//!
//! A parent's concern triggers a two-round interview (questions asked one at
//! a time, each suspending the workflow), compilation of the answers into
//! structured knowledge, independent analysis passes over that knowledge and
//! the child's behavioral history, response synthesis, and a safety gate that
//! may itself suspend for human review. Long-term memory keeps namespaced
//! records per child with semantic recall and temporal trend inference.
//!
//! Suspension is an explicit persisted state, never a held call frame: every
//! `run`/`resume` loads the thread snapshot, applies transitions, and commits
//! a checkpoint before any suspension payload is returned.

pub mod config;
pub mod error;
pub mod interview;
pub mod llm;
pub mod memory;
pub mod safety;
pub mod skills;
pub mod topic;
pub mod workflow;

pub use config::{AssistantConfig, RetryPolicy};
pub use error::{Error, Result};
pub use workflow::{ChildContext, Orchestrator, ResumeInput, RunOutcome, Suspension};

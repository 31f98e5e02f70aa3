//! Workflow orchestrator: the resumable stage pipeline.
//!
//! Each run or resume loads the thread's snapshot, applies stage transitions,
//! and commits a checkpoint after every stage, so a crash loses at most the
//! one external call in flight. Suspensions are persisted before their
//! payload is returned, so a crash between suspension and delivery re-offers
//! the same question or review on reload.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::config::AssistantConfig;
use crate::error::{Result, WorkflowError};
use crate::interview::{KnowledgeCompiler, QuestionPlanner};
use crate::llm::LlmProvider;
use crate::memory::{BehavioralPattern, MemoryManager, TimelineEvent};
use crate::safety::{self, Recommendation, ReviewDecision, SafetyFlag};
use crate::topic::TopicDetector;
use crate::workflow::analysis::{
    detect_emotion, extract_behavior_signals, route, AnalysisEngine, OUTPUT_FALLBACK,
};
use crate::workflow::checkpoint::CheckpointStore;
use crate::workflow::state::{
    ConversationMessage, InterviewPhase, PendingSuspension, QuestionAnswer, WorkflowState,
};

/// Caller-supplied context for a conversation thread.
#[derive(Debug, Clone)]
pub struct ChildContext {
    pub child_id: Uuid,
    pub age_years: Option<u8>,
    pub conversation_id: Uuid,
}

/// Input supplied when resuming a suspended thread.
#[derive(Debug, Clone)]
pub enum ResumeInput {
    /// Answer to a pending interview question.
    Answer(String),
    /// Decision on a pending safety review.
    Review(ReviewDecision),
}

impl ResumeInput {
    fn kind(&self) -> &'static str {
        match self {
            ResumeInput::Answer(_) => "answer",
            ResumeInput::Review(_) => "review",
        }
    }
}

/// Payload returned when a run suspends.
#[derive(Debug, Clone)]
pub enum Suspension {
    Question {
        question: String,
        /// 1-based ordinal within the phase.
        question_number: usize,
        phase: InterviewPhase,
        topic_summary: Option<String>,
    },
    Review {
        content: String,
        flags: Vec<SafetyFlag>,
        recommendation: Recommendation,
    },
}

/// Payload returned when a run completes.
#[derive(Debug, Clone)]
pub struct CompletedRun {
    pub response: String,
    pub safety_flags: Vec<SafetyFlag>,
    pub requires_human_review: bool,
    pub agents_called: Vec<String>,
    pub active_skills: Vec<String>,
}

/// Outcome of `run` or `resume`.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Suspended(Suspension),
    Completed(CompletedRun),
}

pub struct Orchestrator {
    checkpoints: Arc<dyn CheckpointStore>,
    memory: Arc<MemoryManager>,
    analysis: AnalysisEngine,
    planner: QuestionPlanner,
    compiler: KnowledgeCompiler,
    topic_detector: TopicDetector,
    config: AssistantConfig,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

/// Marks a thread as executing; removed on drop.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<Uuid>>>,
    thread_id: Uuid,
}

impl InFlightGuard {
    fn acquire(
        set: &Arc<Mutex<HashSet<Uuid>>>,
        thread_id: Uuid,
    ) -> std::result::Result<Self, WorkflowError> {
        let mut guard = set.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !guard.insert(thread_id) {
            return Err(WorkflowError::ThreadBusy(thread_id));
        }
        Ok(Self {
            set: Arc::clone(set),
            thread_id,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut guard = self
            .set
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.remove(&self.thread_id);
    }
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        checkpoints: Arc<dyn CheckpointStore>,
        memory: Arc<MemoryManager>,
        config: AssistantConfig,
        retry: crate::config::RetryPolicy,
    ) -> Self {
        let analysis = AnalysisEngine::new(
            Arc::clone(&provider),
            Arc::clone(&memory),
            retry,
            config.default_days_back,
        );
        let planner = QuestionPlanner::new(Arc::clone(&provider));
        let compiler = KnowledgeCompiler::new(Arc::clone(&provider));
        let topic_detector = TopicDetector::new(provider, config.topic_context_window);
        Self {
            checkpoints,
            memory,
            analysis,
            planner,
            compiler,
            topic_detector,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Handle a new parent message on a thread.
    pub async fn run(
        &self,
        thread_id: Uuid,
        message: &str,
        ctx: &ChildContext,
    ) -> Result<RunOutcome> {
        let _guard = InFlightGuard::acquire(&self.in_flight, thread_id)?;

        let mut state = match self.checkpoints.load(thread_id).await.map_err(wrap_db)? {
            Some(state) => state,
            None => WorkflowState::new(
                thread_id,
                ctx.child_id,
                ctx.age_years,
                ctx.conversation_id,
            ),
        };
        state.validate()?;

        if state.pending.is_some() {
            return Err(WorkflowError::SuspensionPending(thread_id).into());
        }

        let detection = self
            .topic_detector
            .detect(message, &state.recent_turns(), state.topic_summary.as_deref())
            .await;

        state.messages.push(ConversationMessage::user(message));
        state.parent_emotional_state = detect_emotion(message).to_string();

        let needs_interview = detection.opens_new_topic() || state.gathered_knowledge.is_none();
        if needs_interview {
            tracing::info!(
                thread_id = %thread_id,
                topic = %detection.topic_summary,
                confidence = detection.confidence,
                "Starting interview for new topic"
            );
            state.start_new_topic(message, detection.topic_summary);
            self.begin_phase1(&mut state).await
        } else {
            tracing::info!(thread_id = %thread_id, "Continuing topic; running analysis directly");
            self.run_analysis(&mut state).await
        }
    }

    /// Resume a suspended thread with the input it was waiting for.
    pub async fn resume(&self, thread_id: Uuid, input: ResumeInput) -> Result<RunOutcome> {
        let _guard = InFlightGuard::acquire(&self.in_flight, thread_id)?;

        let mut state = self
            .checkpoints
            .load(thread_id)
            .await
            .map_err(wrap_db)?
            .ok_or(WorkflowError::UnknownThread(thread_id))?;
        state.validate()?;

        let pending = state
            .pending
            .take()
            .ok_or(WorkflowError::NoPendingSuspension(thread_id))?;

        match (pending, input) {
            (PendingSuspension::Question { phase, question_number }, ResumeInput::Answer(answer)) => {
                self.apply_answer(&mut state, phase, question_number, &answer)
                    .await
            }
            (PendingSuspension::Review { content, .. }, ResumeInput::Review(decision)) => {
                self.apply_review(&mut state, &content, &decision).await
            }
            (pending, input) => {
                let expected = match &pending {
                    PendingSuspension::Question { .. } => "answer",
                    PendingSuspension::Review { .. } => "review",
                };
                let got = input.kind();
                // Put the suspension back so a corrected resume still works.
                state.pending = Some(pending);
                Err(WorkflowError::UnexpectedInput {
                    thread_id,
                    expected: expected.to_string(),
                    got: got.to_string(),
                }
                .into())
            }
        }
    }

    async fn begin_phase1(&self, state: &mut WorkflowState) -> Result<RunOutcome> {
        let questions = self
            .planner
            .plan_phase1(&state.initial_concern, state.child_age)
            .await;
        state.phase = InterviewPhase::Phase1;
        state.phase1_questions = questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| QuestionAnswer::new(q, i + 1))
            .collect();
        state.phase1_index = 0;
        self.suspend_on_question(state).await
    }

    async fn apply_answer(
        &self,
        state: &mut WorkflowState,
        phase: InterviewPhase,
        question_number: usize,
        answer: &str,
    ) -> Result<RunOutcome> {
        let thread_id = state.thread_id;
        let (questions, index) = match phase {
            InterviewPhase::Phase1 => (&mut state.phase1_questions, &mut state.phase1_index),
            InterviewPhase::Phase2 => (&mut state.phase2_questions, &mut state.phase2_index),
            _ => {
                return Err(WorkflowError::InvariantViolation {
                    thread_id,
                    message: "question suspension outside an interview phase".to_string(),
                }
                .into());
            }
        };

        let qa = questions
            .get_mut(question_number - 1)
            .ok_or(WorkflowError::InvariantViolation {
                thread_id,
                message: format!("pending question {} not in plan", question_number),
            })?;
        qa.record_answer(answer);
        *index = question_number;
        let phase_done = *index >= questions.len();

        state.messages.push(ConversationMessage::user(answer));

        if !phase_done {
            return self.suspend_on_question(state).await;
        }

        match phase {
            InterviewPhase::Phase1 => {
                let questions = self
                    .planner
                    .plan_phase2(&state.initial_concern, &state.phase1_questions)
                    .await;
                state.phase = InterviewPhase::Phase2;
                state.phase2_questions = questions
                    .into_iter()
                    .enumerate()
                    .map(|(i, q)| QuestionAnswer::new(q, i + 1))
                    .collect();
                state.phase2_index = 0;
                self.suspend_on_question(state).await
            }
            InterviewPhase::Phase2 => {
                let knowledge = self
                    .compiler
                    .compile(
                        &state.initial_concern,
                        state.child_age,
                        &state.phase1_questions,
                        &state.phase2_questions,
                    )
                    .await;
                state.gathered_knowledge = Some(knowledge);
                state.phase = InterviewPhase::Complete;
                state.touch();
                self.checkpoints.save(state).await.map_err(wrap_db)?;
                self.run_analysis(state).await
            }
            _ => unreachable!("guarded above"),
        }
    }

    /// Persist a question suspension and return it.
    async fn suspend_on_question(&self, state: &mut WorkflowState) -> Result<RunOutcome> {
        let (questions, index, phase) = match state.phase {
            InterviewPhase::Phase1 => {
                (&state.phase1_questions, state.phase1_index, InterviewPhase::Phase1)
            }
            InterviewPhase::Phase2 => {
                (&state.phase2_questions, state.phase2_index, InterviewPhase::Phase2)
            }
            _ => {
                return Err(WorkflowError::InvariantViolation {
                    thread_id: state.thread_id,
                    message: "cannot ask a question outside an interview phase".to_string(),
                }
                .into());
            }
        };

        let qa = questions.get(index).ok_or(WorkflowError::InvariantViolation {
            thread_id: state.thread_id,
            message: "question cursor past end of plan".to_string(),
        })?;
        let question = qa.question.clone();
        let question_number = qa.question_number;

        state
            .messages
            .push(ConversationMessage::assistant(question.clone()));
        state.pending = Some(PendingSuspension::Question {
            phase,
            question_number,
        });
        state.touch();
        self.checkpoints.save(state).await.map_err(wrap_db)?;

        Ok(RunOutcome::Suspended(Suspension::Question {
            question,
            question_number,
            phase,
            topic_summary: state.topic_summary.clone(),
        }))
    }

    /// Run the analysis pipeline through the safety gate to completion or a
    /// review suspension.
    async fn run_analysis(&self, state: &mut WorkflowState) -> Result<RunOutcome> {
        let knowledge = state
            .gathered_knowledge
            .clone()
            .ok_or(WorkflowError::InvariantViolation {
                thread_id: state.thread_id,
                message: "analysis requested without gathered knowledge".to_string(),
            })?;

        let routing = route(&knowledge, state.child_age);
        state.active_skills = routing.active_skills.iter().map(|s| s.name.to_string()).collect();
        state.agents_called = routing.agents_to_call.iter().map(|a| a.to_string()).collect();

        // Pattern analysis and resource recommendation are independent.
        let (pattern_analysis, recommendations) = futures::future::join(
            self.analysis.analyze_patterns(state.child_id, &knowledge),
            self.analysis.recommend_resources(state.child_id, &knowledge),
        )
        .await;
        state.pattern_analysis = pattern_analysis;
        state.recommendations = recommendations;
        state.touch();
        self.checkpoints.save(state).await.map_err(wrap_db)?;

        state.perspective = self
            .analysis
            .apply_perspective(
                &knowledge,
                &routing.active_skills,
                state.pattern_analysis.as_deref(),
            )
            .await;
        state.touch();
        self.checkpoints.save(state).await.map_err(wrap_db)?;

        let synthesized = self
            .analysis
            .synthesize(
                &knowledge,
                &state.parent_emotional_state,
                state.pattern_analysis.as_deref(),
                state.perspective.as_deref(),
                state.recommendations.as_deref(),
            )
            .await;
        state.synthesized_response = Some(synthesized.clone());
        state.touch();
        self.checkpoints.save(state).await.map_err(wrap_db)?;

        let assessment = safety::evaluate(&synthesized, &state.initial_concern);
        state.safety_flags = assessment.flags.clone();
        state.requires_human_review = assessment.requires_review;
        state.filtered_response = Some(assessment.filtered_content.clone());

        if assessment.requires_review && self.config.human_in_the_loop {
            state.pending = Some(PendingSuspension::Review {
                content: assessment.filtered_content.clone(),
                flags: assessment.flags.clone(),
                recommendation: assessment.recommendation,
            });
            state.touch();
            self.checkpoints.save(state).await.map_err(wrap_db)?;
            return Ok(RunOutcome::Suspended(Suspension::Review {
                content: assessment.filtered_content,
                flags: assessment.flags,
                recommendation: assessment.recommendation,
            }));
        }

        self.finish(state, assessment.filtered_content).await
    }

    async fn apply_review(
        &self,
        state: &mut WorkflowState,
        held_content: &str,
        decision: &ReviewDecision,
    ) -> Result<RunOutcome> {
        tracing::info!(
            thread_id = %state.thread_id,
            decision = decision.kind(),
            "Applying review decision"
        );
        let final_content = safety::apply_decision(held_content, decision);
        self.finish(state, final_content).await
    }

    /// Commit the final response and write observations back to memory.
    async fn finish(&self, state: &mut WorkflowState, response: String) -> Result<RunOutcome> {
        let response = if response.is_empty() {
            OUTPUT_FALLBACK.to_string()
        } else {
            response
        };

        state.messages.push(ConversationMessage::assistant(response.clone()));
        state.final_response = Some(response.clone());
        state.pending = None;
        state.touch();
        self.checkpoints.save(state).await.map_err(wrap_db)?;

        if let Err(e) = self.write_back_memory(state).await {
            tracing::warn!(thread_id = %state.thread_id, error = %e, "Memory write-back failed");
        }

        Ok(RunOutcome::Completed(CompletedRun {
            response,
            safety_flags: state.safety_flags.clone(),
            requires_human_review: state.requires_human_review,
            agents_called: state.agents_called.clone(),
            active_skills: state.active_skills.clone(),
        }))
    }

    /// Best-effort observation capture after a completed run.
    async fn write_back_memory(&self, state: &WorkflowState) -> Result<()> {
        let concern = &state.initial_concern;
        if concern.is_empty() {
            return Ok(());
        }
        let now = chrono::Utc::now();
        let signals = extract_behavior_signals(concern);

        if signals.behavior.is_some() || !signals.triggers.is_empty() {
            let behavior = signals
                .behavior
                .unwrap_or_else(|| truncate_chars(concern, 100));
            self.memory
                .add_behavioral_pattern(
                    state.child_id,
                    BehavioralPattern {
                        behavior,
                        context: truncate_chars(concern, 200),
                        frequency: "observed_once".to_string(),
                        triggers: signals.triggers,
                        first_observed: now,
                        last_observed: now,
                        severity: "mild".to_string(),
                        notes: None,
                    },
                )
                .await?;
        }

        if concern.chars().count() > 50 {
            self.memory
                .add_timeline_event(
                    state.child_id,
                    TimelineEvent {
                        event: format!("Parent discussed: {}", truncate_chars(concern, 100)),
                        date: now,
                        category: "challenge".to_string(),
                        impact: "Seeking guidance".to_string(),
                        behavioral_changes: Vec::new(),
                    },
                )
                .await?;
        }
        Ok(())
    }
}

fn wrap_db(e: crate::error::DatabaseError) -> crate::error::Error {
    WorkflowError::Checkpoint(e).into()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

//! Interactive console entry point.
//!
//! Wires the orchestrator to a terminal loop: parent messages go in, interview
//! questions and final guidance come out, and flagged responses prompt for an
//! approve/edit/reject decision inline.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Context;
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use parent_assist::config::{AssistantConfig, RetryPolicy};
use parent_assist::llm::{self, Embedder, HashingEmbedder, LlmBackend, LlmConfig};
use parent_assist::memory::{LibSqlMemoryStore, MemoryManager};
use parent_assist::safety::ReviewDecision;
use parent_assist::workflow::{
    ChildContext, LibSqlCheckpointStore, Orchestrator, ResumeInput, RunOutcome, Suspension,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parent_assist=debug")),
        )
        .init();

    let llm_config = llm_config_from_env()?;
    let provider = llm::create_provider(&llm_config)?;

    let embedder: Arc<dyn Embedder> = match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => {
            let model = std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string());
            llm::create_embedder(&SecretString::from(key), &model)?
        }
        _ => {
            tracing::warn!("No OPENAI_API_KEY; using hashing embedder for memory recall");
            Arc::new(HashingEmbedder::default())
        }
    };

    let db_path = std::env::var("DATABASE_PATH").unwrap_or_else(|_| "parent_assist.db".to_string());
    let memory_store = LibSqlMemoryStore::new_local(&db_path, embedder)
        .await
        .context("opening memory store")?;
    let checkpoints = LibSqlCheckpointStore::new_local(&db_path)
        .await
        .context("opening checkpoint store")?;
    let memory = Arc::new(MemoryManager::new(Arc::new(memory_store)));

    let config = AssistantConfig {
        human_in_the_loop: std::env::var("HUMAN_IN_THE_LOOP")
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(true),
        ..AssistantConfig::default()
    };

    let orchestrator = Orchestrator::new(
        provider,
        Arc::new(checkpoints),
        memory,
        config,
        RetryPolicy::default(),
    );

    let ctx = ChildContext {
        child_id: Uuid::new_v4(),
        age_years: std::env::var("CHILD_AGE").ok().and_then(|v| v.parse().ok()),
        conversation_id: Uuid::new_v4(),
    };
    let thread_id = Uuid::new_v4();

    println!("Parent Assist. Describe your concern (Ctrl-D to exit).");
    let stdin = std::io::stdin();
    let mut awaiting: Option<Suspension> = None;

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let outcome = match awaiting.take() {
            Some(Suspension::Question { .. }) => {
                orchestrator
                    .resume(thread_id, ResumeInput::Answer(line.to_string()))
                    .await
            }
            Some(Suspension::Review { .. }) => {
                let decision = match line {
                    "approve" => ReviewDecision::Approve,
                    "reject" => ReviewDecision::Reject { reason: None },
                    edited => ReviewDecision::Edit {
                        edited_content: edited.to_string(),
                    },
                };
                orchestrator
                    .resume(thread_id, ResumeInput::Review(decision))
                    .await
            }
            None => orchestrator.run(thread_id, line, &ctx).await,
        };

        match outcome {
            Ok(RunOutcome::Suspended(suspension)) => {
                match &suspension {
                    Suspension::Question {
                        question,
                        question_number,
                        phase,
                        ..
                    } => {
                        println!("[{:?} q{}] {}", phase, question_number, question);
                    }
                    Suspension::Review {
                        content,
                        flags,
                        recommendation,
                    } => {
                        println!("--- held for review ({:?}, {:?}) ---", flags, recommendation);
                        println!("{}", content);
                        println!("--- type 'approve', 'reject', or replacement text ---");
                    }
                }
                awaiting = Some(suspension);
            }
            Ok(RunOutcome::Completed(run)) => {
                println!("{}", run.response);
                if run.requires_human_review {
                    tracing::info!(flags = ?run.safety_flags, "Delivered after review");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Turn failed");
                println!("(error: {})", e);
            }
        }
    }

    Ok(())
}

fn llm_config_from_env() -> anyhow::Result<LlmConfig> {
    let backend = match std::env::var("LLM_BACKEND").as_deref() {
        Ok("openai") => LlmBackend::OpenAi,
        _ => LlmBackend::Anthropic,
    };
    let (key_var, default_model) = match backend {
        LlmBackend::Anthropic => ("ANTHROPIC_API_KEY", "claude-3-5-sonnet-latest"),
        LlmBackend::OpenAi => ("OPENAI_API_KEY", "gpt-4o"),
    };
    let api_key = std::env::var(key_var).with_context(|| format!("{} must be set", key_var))?;
    let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| default_model.to_string());
    Ok(LlmConfig {
        backend,
        api_key: SecretString::from(api_key),
        model,
    })
}

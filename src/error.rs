//! Error types for Parent Assist.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type for the assistant.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Retry budget exhausted after {attempts} attempts: {reason}")]
    RetriesExhausted { attempts: u32, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Extraction failed: {reason}")]
    ExtractionFailed { reason: String },

    #[error("Embedding failed: {reason}")]
    EmbeddingFailed { reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Long-term memory errors.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("Record not found: {record_type} with key {key}")]
    RecordNotFound { record_type: String, key: Uuid },

    #[error("Wrong record type: expected {expected}, found {found}")]
    WrongRecordType { expected: String, found: String },

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),
}

/// Workflow/state-machine errors.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Unknown thread: {0}")]
    UnknownThread(Uuid),

    #[error("Thread {0} has no pending suspension")]
    NoPendingSuspension(Uuid),

    #[error("Thread {0} is already suspended; resume it instead")]
    SuspensionPending(Uuid),

    #[error("Thread {thread_id} expected {expected} input, got {got}")]
    UnexpectedInput {
        thread_id: Uuid,
        expected: String,
        got: String,
    },

    #[error("Thread {0} is already executing")]
    ThreadBusy(Uuid),

    #[error("State invariant violated for thread {thread_id}: {message}")]
    InvariantViolation { thread_id: Uuid, message: String },

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] DatabaseError),
}

/// Result type alias for the assistant.
pub type Result<T> = std::result::Result<T, Error>;

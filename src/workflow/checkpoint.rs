//! Checkpoint persistence: one JSON state snapshot per thread.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Builder, Connection, Database};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::workflow::state::WorkflowState;

/// Trait for checkpoint storage.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist the snapshot, replacing any previous one for the thread.
    async fn save(&self, state: &WorkflowState) -> Result<(), DatabaseError>;

    /// Load a thread's snapshot.
    async fn load(&self, thread_id: Uuid) -> Result<Option<WorkflowState>, DatabaseError>;
}

/// libsql-backed checkpoint store.
pub struct LibSqlCheckpointStore {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Connection,
}

impl LibSqlCheckpointStore {
    pub async fn new_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn new_memory() -> Result<Self, DatabaseError> {
        Self::new_local(":memory:").await
    }

    async fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS checkpoints (
                    thread_id TEXT PRIMARY KEY,
                    state TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for LibSqlCheckpointStore {
    async fn save(&self, state: &WorkflowState) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(state)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO checkpoints (thread_id, state, updated_at)
                 VALUES (?1, ?2, ?3)",
                libsql::params![
                    state.thread_id.to_string(),
                    json,
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    async fn load(&self, thread_id: Uuid) -> Result<Option<WorkflowState>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT state FROM checkpoints WHERE thread_id = ?1",
                libsql::params![thread_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            Some(row) => {
                let json: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(e.to_string()))?;
                let state = serde_json::from_str(&json)
                    .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }
}

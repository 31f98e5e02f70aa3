//! Memory persistence over libsql.
//!
//! Records are stored as JSON with an embedding of their searchable text.
//! Search embeds the query and ranks candidates by cosine similarity in
//! process; if embedding fails, a keyword-overlap fallback keeps recall
//! working.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Builder, Connection, Database};
use uuid::Uuid;

use crate::error::{DatabaseError, MemoryError};
use crate::llm::{cosine_similarity, Embedder};
use crate::memory::records::{MemoryRecord, RecordType};

/// A record with its storage key and timestamps.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub key: Uuid,
    pub record: MemoryRecord,
    pub created_at: DateTime<Utc>,
}

/// Trait for the long-term memory backend.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Insert or replace a record under `key`. Last write wins.
    async fn put(&self, child_id: Uuid, key: Uuid, record: &MemoryRecord)
        -> Result<(), MemoryError>;

    /// Fetch one record from a namespace.
    async fn get(
        &self,
        child_id: Uuid,
        record_type: RecordType,
        key: Uuid,
    ) -> Result<Option<StoredRecord>, MemoryError>;

    /// Semantic search within a namespace, best matches first.
    async fn search(
        &self,
        child_id: Uuid,
        record_type: RecordType,
        query: &str,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, MemoryError>;

    /// Most recently created records in a namespace.
    async fn list_recent(
        &self,
        child_id: Uuid,
        record_type: RecordType,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, MemoryError>;

    /// Number of records in a namespace.
    async fn count(&self, child_id: Uuid, record_type: RecordType) -> Result<u64, MemoryError>;

    /// Delete every record in a namespace.
    async fn delete_namespace(
        &self,
        child_id: Uuid,
        record_type: RecordType,
    ) -> Result<(), MemoryError>;
}

/// libsql-backed memory store.
pub struct LibSqlMemoryStore {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Connection,
    embedder: Arc<dyn Embedder>,
}

impl LibSqlMemoryStore {
    /// Open or create a local database file.
    pub async fn new_local(
        path: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, DatabaseError> {
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
            embedder,
        };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory database, for tests.
    pub async fn new_memory(embedder: Arc<dyn Embedder>) -> Result<Self, DatabaseError> {
        Self::new_local(":memory:", embedder).await
    }

    async fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS memory_records (
                    key TEXT PRIMARY KEY,
                    child_id TEXT NOT NULL,
                    record_type TEXT NOT NULL,
                    record TEXT NOT NULL,
                    embedding BLOB,
                    created_at TEXT NOT NULL
                )",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        self.conn
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_memory_namespace
                 ON memory_records (child_id, record_type)",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    fn row_to_record(row: &libsql::Row) -> Result<StoredRecord, DatabaseError> {
        let key: String = row
            .get(0)
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        let record_json: String = row
            .get(1)
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        let created_at: String = row
            .get(2)
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let key = Uuid::parse_str(&key)
            .map_err(|e| DatabaseError::Serialization(format!("Bad record key: {}", e)))?;
        let record: MemoryRecord = serde_json::from_str(&record_json)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let created_at = parse_datetime(&created_at)?;
        Ok(StoredRecord {
            key,
            record,
            created_at,
        })
    }

    async fn candidates(
        &self,
        child_id: Uuid,
        record_type: RecordType,
    ) -> Result<Vec<(StoredRecord, Option<Vec<f32>>)>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT key, record, created_at, embedding FROM memory_records
                 WHERE child_id = ?1 AND record_type = ?2",
                libsql::params![child_id.to_string(), record_type.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            let stored = Self::row_to_record(&row)?;
            let blob: Option<Vec<u8>> = row
                .get(3)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
            out.push((stored, blob.map(|b| blob_to_vec(&b))));
        }
        Ok(out)
    }
}

#[async_trait]
impl MemoryStore for LibSqlMemoryStore {
    async fn put(
        &self,
        child_id: Uuid,
        key: Uuid,
        record: &MemoryRecord,
    ) -> Result<(), MemoryError> {
        let record_json = serde_json::to_string(record)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        let embedding = match self.embedder.embed(&record.searchable_text()).await {
            Ok(vec) => Some(vec_to_blob(&vec)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Embedding failed; storing record without vector");
                None
            }
        };

        self.conn
            .execute(
                "INSERT OR REPLACE INTO memory_records
                 (key, child_id, record_type, record, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                libsql::params![
                    key.to_string(),
                    child_id.to_string(),
                    record.record_type().as_str(),
                    record_json,
                    embedding,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    async fn get(
        &self,
        child_id: Uuid,
        record_type: RecordType,
        key: Uuid,
    ) -> Result<Option<StoredRecord>, MemoryError> {
        let mut rows = self
            .conn
            .query(
                "SELECT key, record, created_at FROM memory_records
                 WHERE child_id = ?1 AND record_type = ?2 AND key = ?3",
                libsql::params![
                    child_id.to_string(),
                    record_type.as_str(),
                    key.to_string()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            Some(row) => Ok(Some(Self::row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn search(
        &self,
        child_id: Uuid,
        record_type: RecordType,
        query: &str,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, MemoryError> {
        let candidates = self.candidates(child_id, record_type).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = match self.embedder.embed(query).await {
            Ok(vec) => Some(vec),
            Err(e) => {
                tracing::warn!(error = %e, "Query embedding failed; falling back to keyword overlap");
                None
            }
        };

        let mut scored: Vec<(f32, StoredRecord)> = candidates
            .into_iter()
            .map(|(stored, embedding)| {
                let score = match (&query_vec, &embedding) {
                    (Some(q), Some(v)) => cosine_similarity(q, v),
                    _ => keyword_overlap(query, &stored.record.searchable_text()),
                };
                (score, stored)
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, stored)| stored)
            .collect())
    }

    async fn list_recent(
        &self,
        child_id: Uuid,
        record_type: RecordType,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, MemoryError> {
        let mut rows = self
            .conn
            .query(
                "SELECT key, record, created_at FROM memory_records
                 WHERE child_id = ?1 AND record_type = ?2
                 ORDER BY created_at DESC LIMIT ?3",
                libsql::params![
                    child_id.to_string(),
                    record_type.as_str(),
                    limit as i64
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            out.push(Self::row_to_record(&row)?);
        }
        Ok(out)
    }

    async fn count(&self, child_id: Uuid, record_type: RecordType) -> Result<u64, MemoryError> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM memory_records WHERE child_id = ?1 AND record_type = ?2",
                libsql::params![child_id.to_string(), record_type.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
            .ok_or_else(|| DatabaseError::Query("COUNT returned no rows".to_string()))?;
        let count: i64 = row
            .get(0)
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(count as u64)
    }

    async fn delete_namespace(
        &self,
        child_id: Uuid,
        record_type: RecordType,
    ) -> Result<(), MemoryError> {
        self.conn
            .execute(
                "DELETE FROM memory_records WHERE child_id = ?1 AND record_type = ?2",
                libsql::params![child_id.to_string(), record_type.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }
}

fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Word-overlap score used when no embedding is available.
fn keyword_overlap(query: &str, text: &str) -> f32 {
    let query_words: std::collections::HashSet<String> = query
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect();
    if query_words.is_empty() {
        return 0.0;
    }
    let text_lower = text.to_lowercase();
    let hits = query_words
        .iter()
        .filter(|w| text_lower.contains(w.as_str()))
        .count();
    hits as f32 / query_words.len() as f32
}

/// Parse an RFC 3339 timestamp, tolerating a missing offset.
pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc())
        })
        .map_err(|e| DatabaseError::Serialization(format!("Bad timestamp '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::HashingEmbedder;
    use crate::memory::records::BehavioralPattern;

    async fn store() -> LibSqlMemoryStore {
        LibSqlMemoryStore::new_memory(Arc::new(HashingEmbedder::default()))
            .await
            .unwrap()
    }

    fn pattern(behavior: &str, context: &str) -> MemoryRecord {
        MemoryRecord::BehavioralPattern(BehavioralPattern {
            behavior: behavior.to_string(),
            context: context.to_string(),
            frequency: "daily".to_string(),
            triggers: vec![],
            first_observed: Utc::now(),
            last_observed: Utc::now(),
            severity: "mild".to_string(),
            notes: None,
        })
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let store = store().await;
        let child = Uuid::new_v4();
        let key = Uuid::new_v4();
        store
            .put(child, key, &pattern("tantrum", "bedtime"))
            .await
            .unwrap();

        let found = store
            .get(child, RecordType::BehavioralPatterns, key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.key, key);
        match found.record {
            MemoryRecord::BehavioralPattern(p) => assert_eq!(p.behavior, "tantrum"),
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let store = store().await;
        let child_a = Uuid::new_v4();
        let child_b = Uuid::new_v4();
        store
            .put(child_a, Uuid::new_v4(), &pattern("tantrum", "bedtime"))
            .await
            .unwrap();

        assert_eq!(
            store.count(child_a, RecordType::BehavioralPatterns).await.unwrap(),
            1
        );
        assert_eq!(
            store.count(child_b, RecordType::BehavioralPatterns).await.unwrap(),
            0
        );
        assert_eq!(
            store.count(child_a, RecordType::TimelineEvents).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn search_ranks_similar_first() {
        let store = store().await;
        let child = Uuid::new_v4();
        store
            .put(child, Uuid::new_v4(), &pattern("tantrum screaming", "bedtime"))
            .await
            .unwrap();
        store
            .put(child, Uuid::new_v4(), &pattern("refusing vegetables", "dinner"))
            .await
            .unwrap();

        let results = store
            .search(child, RecordType::BehavioralPatterns, "bedtime tantrum", 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        match &results[0].record {
            MemoryRecord::BehavioralPattern(p) => assert!(p.behavior.contains("tantrum")),
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[tokio::test]
    async fn delete_namespace_only_clears_that_namespace() {
        let store = store().await;
        let child = Uuid::new_v4();
        store
            .put(child, Uuid::new_v4(), &pattern("tantrum", "bedtime"))
            .await
            .unwrap();
        store
            .put(
                child,
                Uuid::new_v4(),
                &MemoryRecord::TimelineEvent(crate::memory::records::TimelineEvent {
                    event: "started preschool".to_string(),
                    date: Utc::now(),
                    category: "life_change".to_string(),
                    impact: "clingier at dropoff".to_string(),
                    behavioral_changes: vec![],
                }),
            )
            .await
            .unwrap();

        store
            .delete_namespace(child, RecordType::BehavioralPatterns)
            .await
            .unwrap();
        assert_eq!(
            store.count(child, RecordType::BehavioralPatterns).await.unwrap(),
            0
        );
        assert_eq!(
            store.count(child, RecordType::TimelineEvents).await.unwrap(),
            1
        );
    }

    #[test]
    fn parse_datetime_tolerates_naive() {
        assert!(parse_datetime("2026-01-05T10:00:00Z").is_ok());
        assert!(parse_datetime("2026-01-05T10:00:00.123").is_ok());
        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn blob_round_trip() {
        let vec = vec![0.5f32, -1.25, 3.0];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }
}

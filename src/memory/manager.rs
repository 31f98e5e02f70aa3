//! Memory manager: typed operations over the record store.
//!
//! Every append creates a fresh key; updates are explicit and merge into the
//! existing record. Trend inference runs over the behavioral-pattern
//! namespace.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MemoryError;
use crate::memory::records::{
    BehavioralPattern, DevelopmentalMilestone, MemoryRecord, RecordType, SuccessfulIntervention,
    TimelineEvent, TriggerResponse,
};
use crate::memory::store::{MemoryStore, StoredRecord};

/// Candidate pool size for trend queries.
const ANALYSIS_SEARCH_LIMIT: usize = 50;
/// Candidate pool size when counting patterns similar to a stored one.
const RECURRENCE_SEARCH_LIMIT: usize = 20;

/// Trend label for temporal pattern analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
            Trend::InsufficientData => "insufficient_data",
        }
    }
}

/// Output of temporal pattern analysis.
#[derive(Debug, Clone, Serialize)]
pub struct TemporalAnalysis {
    pub total_matching: usize,
    /// Occurrence count per frequency label ("daily", "weekly", ...).
    pub frequency_histogram: BTreeMap<String, usize>,
    /// Up to 10 most recently observed matches.
    pub recent_patterns: Vec<BehavioralPattern>,
    pub trend: Trend,
    pub days_analyzed: i64,
}

/// Output of recurrence analysis for one stored behavioral pattern.
#[derive(Debug, Clone, Serialize)]
pub struct RecurrenceAnalysis {
    pub key: Uuid,
    pub behavior: String,
    pub frequency: String,
    pub severity: String,
    pub first_observed: DateTime<Utc>,
    pub last_observed: DateTime<Utc>,
    /// Days between the pattern's first and most recent observation.
    pub duration_days: i64,
    /// Stored patterns resembling this one's behavior, itself included.
    pub similar_count: usize,
}

/// Partial update for a behavioral pattern. `None` fields keep their value;
/// `triggers` is unioned into the existing list.
#[derive(Debug, Clone, Default)]
pub struct PatternUpdate {
    pub behavior: Option<String>,
    pub context: Option<String>,
    pub frequency: Option<String>,
    pub severity: Option<String>,
    pub notes: Option<String>,
    pub triggers: Vec<String>,
    /// New most-recent observation; defaults to now.
    pub last_observed: Option<DateTime<Utc>>,
}

/// Per-namespace slice of a child's memory summary.
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceSummary {
    pub record_type: RecordType,
    pub total: u64,
    pub recent: Vec<MemoryRecord>,
}

/// Manages a child's long-term memory.
pub struct MemoryManager {
    store: Arc<dyn MemoryStore>,
}

impl MemoryManager {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }

    pub async fn add_behavioral_pattern(
        &self,
        child_id: Uuid,
        pattern: BehavioralPattern,
    ) -> Result<Uuid, MemoryError> {
        self.append(child_id, MemoryRecord::BehavioralPattern(pattern))
            .await
    }

    pub async fn add_developmental_milestone(
        &self,
        child_id: Uuid,
        milestone: DevelopmentalMilestone,
    ) -> Result<Uuid, MemoryError> {
        self.append(child_id, MemoryRecord::DevelopmentalMilestone(milestone))
            .await
    }

    pub async fn add_successful_intervention(
        &self,
        child_id: Uuid,
        intervention: SuccessfulIntervention,
    ) -> Result<Uuid, MemoryError> {
        self.append(child_id, MemoryRecord::SuccessfulIntervention(intervention))
            .await
    }

    pub async fn add_trigger_response(
        &self,
        child_id: Uuid,
        trigger_response: TriggerResponse,
    ) -> Result<Uuid, MemoryError> {
        self.append(child_id, MemoryRecord::TriggerResponse(trigger_response))
            .await
    }

    pub async fn add_timeline_event(
        &self,
        child_id: Uuid,
        event: TimelineEvent,
    ) -> Result<Uuid, MemoryError> {
        self.append(child_id, MemoryRecord::TimelineEvent(event))
            .await
    }

    async fn append(&self, child_id: Uuid, record: MemoryRecord) -> Result<Uuid, MemoryError> {
        let key = Uuid::new_v4();
        self.store.put(child_id, key, &record).await?;
        tracing::debug!(child_id = %child_id, key = %key, record_type = %record.record_type(), "Memory record stored");
        Ok(key)
    }

    /// Merge an update into an existing behavioral pattern.
    pub async fn update_behavioral_pattern(
        &self,
        child_id: Uuid,
        key: Uuid,
        update: PatternUpdate,
    ) -> Result<(), MemoryError> {
        let stored = self
            .store
            .get(child_id, RecordType::BehavioralPatterns, key)
            .await?
            .ok_or(MemoryError::RecordNotFound {
                record_type: RecordType::BehavioralPatterns.as_str().to_string(),
                key,
            })?;

        let mut pattern = match stored.record {
            MemoryRecord::BehavioralPattern(p) => p,
            other => {
                return Err(MemoryError::WrongRecordType {
                    expected: RecordType::BehavioralPatterns.as_str().to_string(),
                    found: other.record_type().as_str().to_string(),
                });
            }
        };

        if let Some(behavior) = update.behavior {
            pattern.behavior = behavior;
        }
        if let Some(context) = update.context {
            pattern.context = context;
        }
        if let Some(frequency) = update.frequency {
            pattern.frequency = frequency;
        }
        if let Some(severity) = update.severity {
            pattern.severity = severity;
        }
        if let Some(notes) = update.notes {
            pattern.notes = Some(notes);
        }
        for trigger in update.triggers {
            if !pattern.triggers.contains(&trigger) {
                pattern.triggers.push(trigger);
            }
        }
        let observed = update.last_observed.unwrap_or_else(Utc::now);
        if observed > pattern.last_observed {
            pattern.last_observed = observed;
        }

        self.store
            .put(child_id, key, &MemoryRecord::BehavioralPattern(pattern))
            .await
    }

    /// Patterns semantically similar to the query.
    pub async fn search_similar_patterns(
        &self,
        child_id: Uuid,
        query: &str,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, MemoryError> {
        self.store
            .search(child_id, RecordType::BehavioralPatterns, query, limit)
            .await
    }

    /// Interventions relevant to an issue, for the recommendation stage.
    pub async fn search_relevant_interventions(
        &self,
        child_id: Uuid,
        issue: &str,
        limit: usize,
    ) -> Result<Vec<SuccessfulIntervention>, MemoryError> {
        let results = self
            .store
            .search(child_id, RecordType::SuccessfulInterventions, issue, limit)
            .await?;
        Ok(results
            .into_iter()
            .filter_map(|stored| match stored.record {
                MemoryRecord::SuccessfulIntervention(i) => Some(i),
                _ => None,
            })
            .collect())
    }

    /// How a behavior has trended over the last `days_back` days.
    pub async fn temporal_pattern_analysis(
        &self,
        child_id: Uuid,
        query: &str,
        days_back: i64,
    ) -> Result<TemporalAnalysis, MemoryError> {
        let candidates = self
            .store
            .search(
                child_id,
                RecordType::BehavioralPatterns,
                query,
                ANALYSIS_SEARCH_LIMIT,
            )
            .await?;

        let now = Utc::now();
        let cutoff = now - Duration::days(days_back);
        let mut matching: Vec<BehavioralPattern> = candidates
            .into_iter()
            .filter_map(|stored| match stored.record {
                MemoryRecord::BehavioralPattern(p) if p.last_observed >= cutoff => Some(p),
                _ => None,
            })
            .collect();

        if matching.len() < 2 {
            return Ok(TemporalAnalysis {
                total_matching: matching.len(),
                frequency_histogram: BTreeMap::new(),
                recent_patterns: matching,
                trend: Trend::InsufficientData,
                days_analyzed: days_back,
            });
        }

        let mut frequency_histogram = BTreeMap::new();
        for pattern in &matching {
            *frequency_histogram
                .entry(pattern.frequency.clone())
                .or_insert(0) += 1;
        }

        // Split the window in half and compare observation counts.
        let midpoint = now - Duration::days(days_back / 2);
        let recent_count = matching
            .iter()
            .filter(|p| p.last_observed >= midpoint)
            .count() as f64;
        let older_count = matching.len() as f64 - recent_count;
        let trend = if recent_count > older_count * 1.5 {
            Trend::Increasing
        } else if older_count > recent_count * 1.5 {
            Trend::Decreasing
        } else {
            Trend::Stable
        };

        matching.sort_by(|a, b| b.last_observed.cmp(&a.last_observed));
        let total_matching = matching.len();
        matching.truncate(10);

        Ok(TemporalAnalysis {
            total_matching,
            frequency_histogram,
            recent_patterns: matching,
            trend,
            days_analyzed: days_back,
        })
    }

    /// How long a stored pattern has persisted and how many stored patterns
    /// resemble it.
    pub async fn pattern_recurrence(
        &self,
        child_id: Uuid,
        key: Uuid,
    ) -> Result<RecurrenceAnalysis, MemoryError> {
        let stored = self
            .store
            .get(child_id, RecordType::BehavioralPatterns, key)
            .await?
            .ok_or(MemoryError::RecordNotFound {
                record_type: RecordType::BehavioralPatterns.as_str().to_string(),
                key,
            })?;

        let pattern = match stored.record {
            MemoryRecord::BehavioralPattern(p) => p,
            other => {
                return Err(MemoryError::WrongRecordType {
                    expected: RecordType::BehavioralPatterns.as_str().to_string(),
                    found: other.record_type().as_str().to_string(),
                });
            }
        };

        let similar = self
            .store
            .search(
                child_id,
                RecordType::BehavioralPatterns,
                &pattern.behavior,
                RECURRENCE_SEARCH_LIMIT,
            )
            .await?;
        let similar_count = similar
            .iter()
            .filter(|stored| matches!(stored.record, MemoryRecord::BehavioralPattern(_)))
            .count();

        Ok(RecurrenceAnalysis {
            key,
            duration_days: (pattern.last_observed - pattern.first_observed).num_days(),
            similar_count,
            first_observed: pattern.first_observed,
            last_observed: pattern.last_observed,
            behavior: pattern.behavior,
            frequency: pattern.frequency,
            severity: pattern.severity,
        })
    }

    /// Counts and recent records per namespace.
    pub async fn memory_summary(
        &self,
        child_id: Uuid,
    ) -> Result<Vec<NamespaceSummary>, MemoryError> {
        let mut summaries = Vec::with_capacity(RecordType::ALL.len());
        for record_type in RecordType::ALL {
            let total = self.store.count(child_id, record_type).await?;
            let recent = self
                .store
                .list_recent(child_id, record_type, 5)
                .await?
                .into_iter()
                .map(|stored| stored.record)
                .collect();
            summaries.push(NamespaceSummary {
                record_type,
                total,
                recent,
            });
        }
        Ok(summaries)
    }

    /// Erase every record namespace for a child.
    pub async fn erase_all(&self, child_id: Uuid) -> Result<(), MemoryError> {
        for record_type in RecordType::ALL {
            self.store.delete_namespace(child_id, record_type).await?;
        }
        tracing::info!(child_id = %child_id, "All memory namespaces erased");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::HashingEmbedder;
    use crate::memory::store::LibSqlMemoryStore;

    async fn manager() -> (MemoryManager, Uuid) {
        let store = LibSqlMemoryStore::new_memory(Arc::new(HashingEmbedder::default()))
            .await
            .unwrap();
        (MemoryManager::new(Arc::new(store)), Uuid::new_v4())
    }

    fn pattern_at(behavior: &str, last_observed: DateTime<Utc>) -> BehavioralPattern {
        BehavioralPattern {
            behavior: behavior.to_string(),
            context: "home".to_string(),
            frequency: "daily".to_string(),
            triggers: vec![],
            first_observed: last_observed - Duration::days(1),
            last_observed,
            severity: "mild".to_string(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn append_always_creates_distinct_keys() {
        let (manager, child) = manager().await;
        let a = manager
            .add_behavioral_pattern(child, pattern_at("tantrum", Utc::now()))
            .await
            .unwrap();
        let b = manager
            .add_behavioral_pattern(child, pattern_at("tantrum", Utc::now()))
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn update_merges_and_unions_triggers() {
        let (manager, child) = manager().await;
        let earlier = Utc::now() - Duration::days(3);
        let mut pattern = pattern_at("tantrum", earlier);
        pattern.triggers = vec!["tiredness".to_string()];
        let key = manager.add_behavioral_pattern(child, pattern).await.unwrap();

        manager
            .update_behavioral_pattern(
                child,
                key,
                PatternUpdate {
                    severity: Some("moderate".to_string()),
                    triggers: vec!["tiredness".to_string(), "hunger".to_string()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let results = manager
            .search_similar_patterns(child, "tantrum", 1)
            .await
            .unwrap();
        match &results[0].record {
            MemoryRecord::BehavioralPattern(p) => {
                assert_eq!(p.severity, "moderate");
                assert_eq!(p.triggers, vec!["tiredness", "hunger"]);
                assert!(p.last_observed > earlier);
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[tokio::test]
    async fn update_missing_key_errors() {
        let (manager, child) = manager().await;
        let result = manager
            .update_behavioral_pattern(child, Uuid::new_v4(), PatternUpdate::default())
            .await;
        assert!(matches!(result, Err(MemoryError::RecordNotFound { .. })));
    }

    #[tokio::test]
    async fn trend_increasing_when_recent_dominates() {
        let (manager, child) = manager().await;
        let now = Utc::now();
        // 10 in the recent half, 2 in the older half.
        for i in 0..10 {
            manager
                .add_behavioral_pattern(child, pattern_at("tantrum", now - Duration::days(i)))
                .await
                .unwrap();
        }
        for i in 0..2 {
            manager
                .add_behavioral_pattern(
                    child,
                    pattern_at("tantrum", now - Duration::days(60 + i)),
                )
                .await
                .unwrap();
        }

        let analysis = manager
            .temporal_pattern_analysis(child, "tantrum", 90)
            .await
            .unwrap();
        assert_eq!(analysis.trend, Trend::Increasing);
        assert_eq!(analysis.total_matching, 12);
        assert_eq!(analysis.recent_patterns.len(), 10);
        assert_eq!(analysis.frequency_histogram.get("daily"), Some(&12));
    }

    #[tokio::test]
    async fn trend_decreasing_when_older_dominates() {
        let (manager, child) = manager().await;
        let now = Utc::now();
        for i in 0..8 {
            manager
                .add_behavioral_pattern(
                    child,
                    pattern_at("tantrum", now - Duration::days(50 + i)),
                )
                .await
                .unwrap();
        }
        manager
            .add_behavioral_pattern(child, pattern_at("tantrum", now - Duration::days(2)))
            .await
            .unwrap();

        let analysis = manager
            .temporal_pattern_analysis(child, "tantrum", 90)
            .await
            .unwrap();
        assert_eq!(analysis.trend, Trend::Decreasing);
    }

    #[tokio::test]
    async fn single_record_is_insufficient_data() {
        let (manager, child) = manager().await;
        manager
            .add_behavioral_pattern(child, pattern_at("tantrum", Utc::now()))
            .await
            .unwrap();

        let analysis = manager
            .temporal_pattern_analysis(child, "tantrum", 90)
            .await
            .unwrap();
        assert_eq!(analysis.trend, Trend::InsufficientData);
        assert_eq!(analysis.total_matching, 1);
    }

    #[tokio::test]
    async fn old_records_fall_outside_window() {
        let (manager, child) = manager().await;
        let now = Utc::now();
        manager
            .add_behavioral_pattern(child, pattern_at("tantrum", now - Duration::days(200)))
            .await
            .unwrap();
        manager
            .add_behavioral_pattern(child, pattern_at("tantrum", now - Duration::days(210)))
            .await
            .unwrap();

        let analysis = manager
            .temporal_pattern_analysis(child, "tantrum", 90)
            .await
            .unwrap();
        assert_eq!(analysis.total_matching, 0);
        assert_eq!(analysis.trend, Trend::InsufficientData);
    }

    #[tokio::test]
    async fn recurrence_reports_own_span_and_similar_count() {
        let (manager, child) = manager().await;
        let now = Utc::now();
        let mut pattern = pattern_at("hitting", now - Duration::days(2));
        pattern.first_observed = now - Duration::days(30);
        let key = manager
            .add_behavioral_pattern(child, pattern)
            .await
            .unwrap();
        // A second, newer pattern for the same behavior must not stretch the
        // reported span.
        manager
            .add_behavioral_pattern(child, pattern_at("hitting", now))
            .await
            .unwrap();

        let recurrence = manager.pattern_recurrence(child, key).await.unwrap();
        assert_eq!(recurrence.key, key);
        assert_eq!(recurrence.behavior, "hitting");
        assert_eq!(recurrence.duration_days, 28);
        assert_eq!(recurrence.similar_count, 2);
        assert_eq!(recurrence.first_observed, now - Duration::days(30));
        assert_eq!(recurrence.last_observed, now - Duration::days(2));
    }

    #[tokio::test]
    async fn recurrence_missing_pattern_errors() {
        let (manager, child) = manager().await;
        let result = manager.pattern_recurrence(child, Uuid::new_v4()).await;
        assert!(matches!(result, Err(MemoryError::RecordNotFound { .. })));
    }

    #[tokio::test]
    async fn erase_all_leaves_every_namespace_empty() {
        let (manager, child) = manager().await;
        manager
            .add_behavioral_pattern(child, pattern_at("tantrum", Utc::now()))
            .await
            .unwrap();
        manager
            .add_timeline_event(
                child,
                TimelineEvent {
                    event: "new sibling".to_string(),
                    date: Utc::now(),
                    category: "life_change".to_string(),
                    impact: "more tantrums".to_string(),
                    behavioral_changes: vec![],
                },
            )
            .await
            .unwrap();

        manager.erase_all(child).await.unwrap();
        let summary = manager.memory_summary(child).await.unwrap();
        assert!(summary.iter().all(|s| s.total == 0 && s.recent.is_empty()));
    }

    #[tokio::test]
    async fn memory_summary_counts_per_namespace() {
        let (manager, child) = manager().await;
        manager
            .add_behavioral_pattern(child, pattern_at("tantrum", Utc::now()))
            .await
            .unwrap();

        let summary = manager.memory_summary(child).await.unwrap();
        let patterns = summary
            .iter()
            .find(|s| s.record_type == RecordType::BehavioralPatterns)
            .unwrap();
        assert_eq!(patterns.total, 1);
        assert_eq!(patterns.recent.len(), 1);
    }
}

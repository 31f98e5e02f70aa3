//! Long-term memory record types.
//!
//! Records are namespaced per `(child_id, RecordType)` and stored as JSON
//! alongside an embedding of their searchable text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The five record namespaces kept per child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    BehavioralPatterns,
    DevelopmentalHistory,
    SuccessfulInterventions,
    TriggersAndResponses,
    TimelineEvents,
}

impl RecordType {
    pub const ALL: [RecordType; 5] = [
        RecordType::BehavioralPatterns,
        RecordType::DevelopmentalHistory,
        RecordType::SuccessfulInterventions,
        RecordType::TriggersAndResponses,
        RecordType::TimelineEvents,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::BehavioralPatterns => "behavioral_patterns",
            RecordType::DevelopmentalHistory => "developmental_history",
            RecordType::SuccessfulInterventions => "successful_interventions",
            RecordType::TriggersAndResponses => "triggers_and_responses",
            RecordType::TimelineEvents => "timeline_events",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An observed behavioral pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehavioralPattern {
    pub behavior: String,
    /// Context in which the behavior occurs.
    pub context: String,
    /// Rough cadence, e.g. "daily", "weekly".
    pub frequency: String,
    pub triggers: Vec<String>,
    pub first_observed: DateTime<Utc>,
    pub last_observed: DateTime<Utc>,
    /// mild, moderate, severe.
    pub severity: String,
    pub notes: Option<String>,
}

/// A developmental milestone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevelopmentalMilestone {
    pub milestone: String,
    /// physical, cognitive, social, emotional.
    pub category: String,
    pub achieved_at: Option<DateTime<Utc>>,
    pub age_months: u32,
    pub notes: Option<String>,
}

/// A strategy that worked, and the context it worked in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessfulIntervention {
    pub strategy: String,
    pub issue_addressed: String,
    /// low, medium, high.
    pub effectiveness: String,
    pub applied_date: DateTime<Utc>,
    pub outcome: String,
    pub applicable_contexts: Vec<String>,
}

/// A trigger and the child's typical response to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub trigger: String,
    pub typical_response: String,
    /// mild, moderate, severe.
    pub severity: String,
    pub successful_coping: Vec<String>,
    pub observed_dates: Vec<DateTime<Utc>>,
}

/// A significant event on the child's timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub event: String,
    pub date: DateTime<Utc>,
    /// life_change, achievement, challenge, medical, other.
    pub category: String,
    pub impact: String,
    pub behavioral_changes: Vec<String>,
}

/// A memory record, tagged by namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MemoryRecord {
    BehavioralPattern(BehavioralPattern),
    DevelopmentalMilestone(DevelopmentalMilestone),
    SuccessfulIntervention(SuccessfulIntervention),
    TriggerResponse(TriggerResponse),
    TimelineEvent(TimelineEvent),
}

impl MemoryRecord {
    /// Namespace this record belongs in.
    pub fn record_type(&self) -> RecordType {
        match self {
            MemoryRecord::BehavioralPattern(_) => RecordType::BehavioralPatterns,
            MemoryRecord::DevelopmentalMilestone(_) => RecordType::DevelopmentalHistory,
            MemoryRecord::SuccessfulIntervention(_) => RecordType::SuccessfulInterventions,
            MemoryRecord::TriggerResponse(_) => RecordType::TriggersAndResponses,
            MemoryRecord::TimelineEvent(_) => RecordType::TimelineEvents,
        }
    }

    /// Text fed to the embedder and to keyword fallback search.
    pub fn searchable_text(&self) -> String {
        match self {
            MemoryRecord::BehavioralPattern(p) => {
                let mut text = format!("{} {} {}", p.behavior, p.context, p.frequency);
                if !p.triggers.is_empty() {
                    text.push(' ');
                    text.push_str(&p.triggers.join(" "));
                }
                if let Some(notes) = &p.notes {
                    text.push(' ');
                    text.push_str(notes);
                }
                text
            }
            MemoryRecord::DevelopmentalMilestone(m) => {
                let mut text = format!("{} {}", m.milestone, m.category);
                if let Some(notes) = &m.notes {
                    text.push(' ');
                    text.push_str(notes);
                }
                text
            }
            MemoryRecord::SuccessfulIntervention(i) => format!(
                "{} {} {} {}",
                i.strategy,
                i.issue_addressed,
                i.outcome,
                i.applicable_contexts.join(" ")
            ),
            MemoryRecord::TriggerResponse(t) => format!(
                "{} {} {}",
                t.trigger,
                t.typical_response,
                t.successful_coping.join(" ")
            ),
            MemoryRecord::TimelineEvent(e) => format!(
                "{} {} {} {}",
                e.event,
                e.category,
                e.impact,
                e.behavioral_changes.join(" ")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pattern() -> MemoryRecord {
        MemoryRecord::BehavioralPattern(BehavioralPattern {
            behavior: "tantrum".to_string(),
            context: "bedtime".to_string(),
            frequency: "daily".to_string(),
            triggers: vec!["tiredness".to_string()],
            first_observed: Utc::now(),
            last_observed: Utc::now(),
            severity: "moderate".to_string(),
            notes: None,
        })
    }

    #[test]
    fn record_type_matches_variant() {
        assert_eq!(
            sample_pattern().record_type(),
            RecordType::BehavioralPatterns
        );
    }

    #[test]
    fn searchable_text_includes_triggers() {
        let text = sample_pattern().searchable_text();
        assert!(text.contains("tantrum"));
        assert!(text.contains("tiredness"));
    }

    #[test]
    fn serde_round_trip_preserves_tag() {
        let json = serde_json::to_string(&sample_pattern()).unwrap();
        assert!(json.contains("\"type\":\"behavioral_pattern\""));
        let back: MemoryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.record_type(), RecordType::BehavioralPatterns);
    }

    #[test]
    fn record_type_str_is_namespace_name() {
        assert_eq!(RecordType::TimelineEvents.as_str(), "timeline_events");
        assert_eq!(RecordType::ALL.len(), 5);
    }
}

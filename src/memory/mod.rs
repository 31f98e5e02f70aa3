//! Long-term memory: namespaced records per child, semantic recall, and
//! temporal trend inference.

pub mod manager;
pub mod records;
pub mod store;

pub use manager::{
    MemoryManager, NamespaceSummary, PatternUpdate, RecurrenceAnalysis, TemporalAnalysis, Trend,
};
pub use records::{
    BehavioralPattern, DevelopmentalMilestone, MemoryRecord, RecordType, SuccessfulIntervention,
    TimelineEvent, TriggerResponse,
};
pub use store::{LibSqlMemoryStore, MemoryStore, StoredRecord};

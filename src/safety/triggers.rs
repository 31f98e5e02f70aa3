//! Sensitive-topic detection over user messages and draft responses.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Categories of sensitive content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyFlag {
    Emergency,
    Harm,
    MedicalAdvice,
    Medical,
    DevelopmentalConcern,
}

impl SafetyFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyFlag::Emergency => "emergency",
            SafetyFlag::Harm => "harm",
            SafetyFlag::MedicalAdvice => "medical_advice",
            SafetyFlag::Medical => "medical",
            SafetyFlag::DevelopmentalConcern => "developmental_concern",
        }
    }
}

impl std::fmt::Display for SafetyFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity ladder, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Safe,
    Moderate,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Safe => "safe",
            Severity::Moderate => "moderate",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Reviewer guidance attached to a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    ProceedNormally,
    EscalateImmediately,
    RequireProfessionalConsultation,
    AddDisclaimerAndReview,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::ProceedNormally => "proceed_normally",
            Recommendation::EscalateImmediately => "escalate_immediately",
            Recommendation::RequireProfessionalConsultation => {
                "require_professional_consultation"
            }
            Recommendation::AddDisclaimerAndReview => "add_disclaimer_and_review",
        }
    }
}

/// Result of scanning a piece of text.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub severity: Severity,
    pub requires_review: bool,
    pub flags: Vec<SafetyFlag>,
    pub matched_terms: Vec<String>,
    pub recommendation: Recommendation,
}

const MEDICAL_PATTERNS: &[&str] = &[
    r"(?i)\b(adhd|add|autism|asd|asperger)\b",
    r"(?i)\b(depression|anxiety|ptsd|ocd)\b",
    r"(?i)\b(bipolar|schizophrenia|psychosis)\b",
    r"(?i)\b(disorder|syndrome|diagnosis)\b",
    r"(?i)\b(medication|prescri(be|ption)|pill|drug)\b",
    r"(?i)\b(therapist|psychiatrist|psychologist|doctor)\b",
];

const HARM_PATTERNS: &[&str] = &[
    r"(?i)\b(abuse|abusive|abused)\b",
    r"(?i)\b(hit|hitting|beat|beating|hurt|hurting)\b",
    r"(?i)\b(self[- ]harm|cutting|suicide|kill)\b",
    r"(?i)\b(neglect|neglected|abandoned)\b",
    r"(?i)\b(violence|violent|aggress(ion|ive))\b",
    r"(?i)\b(trauma|traumatic|traumatized)\b",
];

const EMERGENCY_PATTERNS: &[&str] = &[
    r"(?i)\b(emergency|urgent|immediate|crisis)\b",
    r"(?i)\b(danger|dangerous|unsafe)\b",
    r"(?i)\b(hospital|911|emergency room|er)\b",
    r"(?i)\b(suicide|suicidal|kill (myself|himself|herself))\b",
];

const DEVELOPMENTAL_PATTERNS: &[&str] = &[
    r"(?i)\b(not (talking|speaking|walking))\b",
    r"(?i)\b(severe(ly)? delay(ed)?)\b",
    r"(?i)\b(regress(ion|ing|ed))\b",
    r"(?i)\b(stop(ped)? (eating|drinking|sleeping))\b",
];

const MEDICAL_ADVICE_PATTERNS: &[&str] = &[
    r"(?i)\b(should (i|we) (give|take|use))\b",
    r"(?i)\b(how much|dosage|dose)\b",
    r"(?i)\b(stop (taking|using)|start (taking|using))\b",
    r"(?i)\b(safe to (give|take|use))\b",
];

struct CompiledPatterns {
    medical: Vec<Regex>,
    harm: Vec<Regex>,
    emergency: Vec<Regex>,
    developmental: Vec<Regex>,
    medical_advice: Vec<Regex>,
}

fn compiled() -> &'static CompiledPatterns {
    static PATTERNS: OnceLock<CompiledPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |patterns: &[&str]| {
            patterns
                .iter()
                .map(|p| Regex::new(p).expect("trigger pattern is valid"))
                .collect()
        };
        CompiledPatterns {
            medical: compile(MEDICAL_PATTERNS),
            harm: compile(HARM_PATTERNS),
            emergency: compile(EMERGENCY_PATTERNS),
            developmental: compile(DEVELOPMENTAL_PATTERNS),
            medical_advice: compile(MEDICAL_ADVICE_PATTERNS),
        }
    })
}

fn check(text: &str, patterns: &[Regex], matched: &mut Vec<String>) -> bool {
    let mut any = false;
    for pattern in patterns {
        for found in pattern.find_iter(text) {
            let term = found.as_str().to_lowercase();
            if !matched.contains(&term) {
                matched.push(term);
            }
            any = true;
        }
    }
    any
}

/// Scan text for sensitive content.
pub fn detect_sensitive_content(text: &str) -> Detection {
    let patterns = compiled();
    let mut flags = Vec::new();
    let mut matched_terms = Vec::new();

    if check(text, &patterns.emergency, &mut matched_terms) {
        flags.push(SafetyFlag::Emergency);
    }
    if check(text, &patterns.harm, &mut matched_terms) {
        flags.push(SafetyFlag::Harm);
    }
    if check(text, &patterns.medical_advice, &mut matched_terms) {
        flags.push(SafetyFlag::MedicalAdvice);
    }
    if check(text, &patterns.medical, &mut matched_terms) {
        flags.push(SafetyFlag::Medical);
    }
    if check(text, &patterns.developmental, &mut matched_terms) {
        flags.push(SafetyFlag::DevelopmentalConcern);
    }

    let (severity, requires_review, recommendation) = assess_severity(&flags);
    Detection {
        severity,
        requires_review,
        flags,
        matched_terms,
        recommendation,
    }
}

/// Map flags to the severity ladder. Any flagged text that matches no
/// specific rule still lands at moderate.
pub fn assess_severity(flags: &[SafetyFlag]) -> (Severity, bool, Recommendation) {
    if flags.is_empty() {
        return (Severity::Safe, false, Recommendation::ProceedNormally);
    }
    if flags.contains(&SafetyFlag::Emergency) || flags.contains(&SafetyFlag::Harm) {
        return (
            Severity::Critical,
            true,
            Recommendation::EscalateImmediately,
        );
    }
    if flags.contains(&SafetyFlag::MedicalAdvice)
        || (flags.contains(&SafetyFlag::DevelopmentalConcern)
            && flags.contains(&SafetyFlag::Medical))
    {
        return (
            Severity::High,
            true,
            Recommendation::RequireProfessionalConsultation,
        );
    }
    (
        Severity::Moderate,
        true,
        Recommendation::AddDisclaimerAndReview,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benign_text_is_safe() {
        let detection = detect_sensitive_content("My 4-year-old won't share toys at preschool");
        assert_eq!(detection.severity, Severity::Safe);
        assert!(!detection.requires_review);
        assert!(detection.flags.is_empty());
        assert_eq!(detection.recommendation, Recommendation::ProceedNormally);
    }

    #[test]
    fn emergency_keyword_is_critical() {
        let detection = detect_sensitive_content("This feels like an emergency, he is in danger");
        assert_eq!(detection.severity, Severity::Critical);
        assert!(detection.requires_review);
        assert!(detection.flags.contains(&SafetyFlag::Emergency));
        assert_eq!(detection.recommendation, Recommendation::EscalateImmediately);
    }

    #[test]
    fn harm_keyword_is_critical() {
        let detection = detect_sensitive_content("She keeps hitting her brother");
        assert_eq!(detection.severity, Severity::Critical);
        assert!(detection.flags.contains(&SafetyFlag::Harm));
    }

    #[test]
    fn medical_advice_is_high() {
        let detection = detect_sensitive_content("What dosage is right for a 6-year-old?");
        assert_eq!(detection.severity, Severity::High);
        assert!(detection.flags.contains(&SafetyFlag::MedicalAdvice));
        assert_eq!(
            detection.recommendation,
            Recommendation::RequireProfessionalConsultation
        );
    }

    #[test]
    fn developmental_plus_medical_is_high() {
        let detection =
            detect_sensitive_content("He stopped eating and the doctor is worried about it");
        assert_eq!(detection.severity, Severity::High);
    }

    #[test]
    fn medical_mention_alone_is_moderate() {
        let detection = detect_sensitive_content("Could this be related to adhd?");
        assert_eq!(detection.severity, Severity::Moderate);
        assert!(detection.requires_review);
        assert_eq!(
            detection.recommendation,
            Recommendation::AddDisclaimerAndReview
        );
    }

    #[test]
    fn matching_is_case_insensitive_and_deduped() {
        let detection = detect_sensitive_content("EMERGENCY! This is an emergency.");
        assert_eq!(detection.matched_terms, vec!["emergency".to_string()]);
    }

    #[test]
    fn severity_orders_correctly() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Moderate);
        assert!(Severity::Moderate > Severity::Safe);
    }
}

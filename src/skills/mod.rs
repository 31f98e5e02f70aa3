//! Guidance lenses and their applicability scoring.
//!
//! Each lens declares an age range, a keyword vocabulary, and the concern
//! kinds it is best suited for. Scoring is deterministic: an age gate, a
//! keyword-overlap ratio, and a fixed boost when the concern hits the lens's
//! best-for list.

mod behaviorist;
mod developmental;

pub use behaviorist::behaviorist_skill;
pub use developmental::developmental_skill;

use std::collections::HashSet;

use serde::Serialize;

/// Score above which a lens participates in analysis.
const APPLICABILITY_THRESHOLD: f64 = 0.2;
/// Added when the concern overlaps the lens's best-for set.
const BEST_FOR_BOOST: f64 = 0.3;

/// Static profile of a guidance lens.
#[derive(Debug, Clone)]
pub struct SkillProfile {
    pub name: &'static str,
    pub description: &'static str,
    /// Inclusive age range in years.
    pub min_age: u8,
    pub max_age: u8,
    pub keywords: &'static [&'static str],
    pub best_for: &'static [&'static str],
    /// System prompt fragment injected when this lens is active.
    pub perspective_prompt: &'static str,
}

/// A scored lens.
#[derive(Debug, Clone, Serialize)]
pub struct SkillScore {
    pub name: &'static str,
    pub score: f64,
    pub applicable: bool,
}

impl SkillProfile {
    /// Score this lens against extracted concern keywords and the child's age.
    ///
    /// Outside the age range the lens scores zero and is never applicable.
    /// Otherwise the score is the fraction of the lens vocabulary present in
    /// the concern, boosted when a concern keyword is exactly one of the
    /// best-for categories, clamped to `[0, 1]`.
    pub fn score(&self, concern_keywords: &[String], age_years: u8) -> SkillScore {
        if age_years < self.min_age || age_years > self.max_age {
            return SkillScore {
                name: self.name,
                score: 0.0,
                applicable: false,
            };
        }
        if self.keywords.is_empty() {
            return SkillScore {
                name: self.name,
                score: 0.0,
                applicable: false,
            };
        }

        let concern: HashSet<String> = concern_keywords
            .iter()
            .map(|k| k.to_lowercase())
            .collect();

        let keyword_hits = self
            .keywords
            .iter()
            .filter(|k| concern.contains(&k.to_lowercase()))
            .count();
        let mut score = keyword_hits as f64 / self.keywords.len() as f64;

        let best_for_hit = self
            .best_for
            .iter()
            .any(|topic| concern.contains(&topic.to_lowercase()));
        if best_for_hit {
            score += BEST_FOR_BOOST;
        }

        let score = score.clamp(0.0, 1.0);
        SkillScore {
            name: self.name,
            score,
            applicable: score > APPLICABILITY_THRESHOLD,
        }
    }
}

/// All registered lenses.
pub fn all_skills() -> Vec<SkillProfile> {
    vec![behaviorist_skill(), developmental_skill()]
}

/// Score every lens and return the applicable ones, highest score first.
pub fn applicable_skills(concern_keywords: &[String], age_years: u8) -> Vec<SkillScore> {
    let mut scores: Vec<SkillScore> = all_skills()
        .iter()
        .map(|skill| skill.score(concern_keywords, age_years))
        .filter(|s| s.applicable)
        .collect();
    scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scores
}

/// Look up a lens profile by name.
pub fn skill_by_name(name: &str) -> Option<SkillProfile> {
    all_skills().into_iter().find(|s| s.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn age_gate_zeroes_score() {
        let skill = behaviorist_skill();
        let score = skill.score(&keywords(&["tantrum", "reward"]), 25);
        assert_eq!(score.score, 0.0);
        assert!(!score.applicable);
    }

    #[test]
    fn overlap_plus_boost_makes_applicable() {
        // "tantrums" is both a vocabulary miss and an exact best-for category:
        // one hit out of sixteen plus the boost clears the threshold.
        let skill = behaviorist_skill();
        let score = skill.score(&keywords(&["tantrum", "tantrums"]), 10);
        assert!(score.applicable, "score was {}", score.score);
        assert!(score.score > 0.3 && score.score < 0.5);
    }

    #[test]
    fn best_for_boost_needs_exact_category_match() {
        // "formation" is a substring of the "habit formation" category but not
        // a category itself, and it is not in the vocabulary either.
        let skill = behaviorist_skill();
        let score = skill.score(&keywords(&["formation"]), 6);
        assert_eq!(score.score, 0.0);
        assert!(!score.applicable);
    }

    #[test]
    fn exact_category_hit_earns_fixed_boost() {
        let profile = SkillProfile {
            name: "Test Lens",
            description: "test",
            min_age: 2,
            max_age: 18,
            keywords: &["tantrum", "reward"],
            best_for: &["discipline"],
            perspective_prompt: "test",
        };
        // One vocabulary hit of two (0.5) plus the 0.3 category boost.
        let score = profile.score(&keywords(&["tantrum", "discipline"]), 10);
        assert!((score.score - 0.8).abs() < 1e-9, "score was {}", score.score);
        assert!(score.applicable);

        let outside = profile.score(&keywords(&["tantrum", "discipline"]), 25);
        assert_eq!(outside.score, 0.0);
        assert!(!outside.applicable);
    }

    #[test]
    fn no_overlap_is_not_applicable() {
        let skill = behaviorist_skill();
        let score = skill.score(&keywords(&["sleep", "nightmare"]), 5);
        assert!(!score.applicable);
    }

    #[test]
    fn score_is_clamped_to_one() {
        let skill = developmental_skill();
        let all: Vec<String> = skill.keywords.iter().map(|k| k.to_string()).collect();
        let score = skill.score(&all, 5);
        assert!(score.score <= 1.0);
        assert!(score.applicable);
    }

    #[test]
    fn applicable_skills_sorted_descending() {
        let scores = applicable_skills(
            &keywords(&[
                "tantrum",
                "reward",
                "discipline",
                "chart",
                "age",
                "milestone",
                "stage",
                "normal",
            ]),
            4,
        );
        assert!(!scores.is_empty());
        for pair in scores.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn developmental_covers_infants() {
        let skill = developmental_skill();
        let score = skill.score(&keywords(&["milestone", "age"]), 0);
        assert!(score.score > 0.0);
    }
}

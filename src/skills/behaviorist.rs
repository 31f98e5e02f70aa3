//! Behaviorist lens: reinforcement, consequences, habit formation.

use crate::skills::SkillProfile;

pub fn behaviorist_skill() -> SkillProfile {
    SkillProfile {
        name: "Behaviorist Approach",
        description:
            "Address behaviors through reinforcement, consequences, and habit formation",
        min_age: 2,
        max_age: 18,
        keywords: &[
            "behavior",
            "habit",
            "routine",
            "tantrum",
            "reward",
            "consequence",
            "punishment",
            "reinforcement",
            "discipline",
            "obedience",
            "compliance",
            "anger",
            "aggression",
            "chart",
            "sticker",
            "incentive",
        ],
        best_for: &[
            "habit formation",
            "behavior modification",
            "tantrums",
            "compliance issues",
            "routines",
            "reward systems",
        ],
        perspective_prompt: "Analyze through a behaviorist lens. Identify the ABC pattern \
            (antecedent, behavior, consequence), the function the behavior serves \
            (attention, escape, sensory, tangible), and what currently reinforces it. \
            Suggest reinforcement-based adjustments, not punishment-first approaches.",
    }
}

//! Developmental-psychology lens: stages and age-appropriate expectations.

use crate::skills::SkillProfile;

pub fn developmental_skill() -> SkillProfile {
    SkillProfile {
        name: "Developmental Psychology",
        description:
            "Understand behaviors through developmental stages and age-appropriate expectations",
        min_age: 0,
        max_age: 18,
        keywords: &[
            "age",
            "developmental",
            "stage",
            "milestone",
            "growth",
            "transition",
            "regression",
            "maturity",
            "normal",
            "typical",
            "appropriate",
            "expected",
            "piaget",
            "erikson",
            "egocentric",
        ],
        best_for: &[
            "age-appropriate behavior questions",
            "developmental milestones",
            "regression concerns",
            "transition difficulties",
            "cognitive development",
        ],
        perspective_prompt: "Analyze through a developmental lens. Place the child in \
            Piaget's and Erikson's stages for their age, say whether the behavior is \
            developmentally expected, flag genuine red flags versus normal variation, \
            and frame guidance around the current stage's needs.",
    }
}

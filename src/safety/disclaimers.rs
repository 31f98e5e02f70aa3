//! Disclaimer templates and response formatting.

use crate::safety::triggers::SafetyFlag;

pub const GENERAL_DISCLAIMER: &str = "**Important Disclaimer:**\n\
This advice is for general informational and educational purposes only. It is not a substitute \
for professional medical advice, diagnosis, or treatment. Always seek the advice of qualified \
health professionals with questions regarding your child's health or development.";

pub const MEDICAL_DISCLAIMER: &str = "**Medical Disclaimer:**\n\
The information provided is not medical advice and should not be used for diagnosing or treating \
health conditions. If your child is experiencing medical symptoms or you have concerns about \
medications, please consult a qualified healthcare provider immediately.\n\n\
**When to seek professional help:**\n\
- Persistent or worsening symptoms\n\
- Concerns about medications or dosages\n\
- Need for diagnosis or treatment plan\n\
- Questions about your child's physical or mental health";

pub const EMERGENCY_DISCLAIMER: &str = "🚨 **EMERGENCY NOTICE** 🚨\n\n\
If your child is in immediate danger or experiencing a medical emergency:\n\
- **Call 911** or your local emergency services immediately\n\
- Contact your local crisis hotline\n\
- Go to the nearest emergency room\n\n\
**This system cannot provide emergency assistance.**\n\n\
For non-emergency mental health support:\n\
- National Suicide Prevention Lifeline: 988\n\
- Crisis Text Line: Text HOME to 741741\n\
- SAMHSA National Helpline: 1-800-662-4357";

pub const DEVELOPMENTAL_DISCLAIMER: &str = "**Developmental Concerns Disclaimer:**\n\
While I can provide general guidance about child development, significant developmental delays \
or concerns require professional evaluation.\n\n\
**Please consult a pediatrician or developmental specialist if:**\n\
- Your child is not meeting expected developmental milestones\n\
- You notice regression in previously acquired skills\n\
- You have concerns about your child's speech, motor skills, or social development\n\
- Your child's behavior significantly impacts daily functioning\n\n\
Early intervention can make a significant difference in developmental outcomes.";

pub const PROFESSIONAL_REFERRAL_DISCLAIMER: &str = "**Professional Referral Recommended:**\n\
Based on the nature of your concern, I strongly recommend consulting with:\n\n\
- **Pediatrician**: For medical or physical health concerns\n\
- **Child Psychologist/Psychiatrist**: For mental health or behavioral concerns\n\
- **Developmental Specialist**: For developmental delays or autism screening\n\
- **Licensed Therapist**: For ongoing behavioral therapy and support\n\n\
These professionals can provide:\n\
- Comprehensive evaluation and diagnosis\n\
- Evidence-based treatment plans\n\
- Ongoing monitoring and adjustment of interventions\n\
- Coordination with other healthcare providers\n\n\
**This system provides general guidance only** and cannot replace professional clinical \
evaluation.";

/// Fixed replacement used when a reviewer rejects a response.
pub const REJECTION_MESSAGE: &str = "Thank you for your question. Based on the nature of your \
concern, I strongly recommend consulting with a qualified professional who can provide \
personalized guidance for your child's specific situation.\n\n\
**Professional resources that may help:**\n\
- **Pediatrician**: For medical or developmental concerns\n\
- **Child Psychologist**: For behavioral or emotional concerns\n\
- **Licensed Therapist**: For ongoing support and intervention strategies\n\n\
If this is an emergency situation, please contact:\n\
- **911** for immediate emergencies\n\
- **988** for mental health crisis support\n\
- Your local crisis hotline\n\n\
I'm here to support you with general parenting guidance, but your child's wellbeing may benefit \
from professional clinical assessment.";

/// Disclaimers applicable to a set of flags, general first, each at most once.
pub fn disclaimers_for_flags(flags: &[SafetyFlag]) -> Vec<&'static str> {
    let mut disclaimers = vec![GENERAL_DISCLAIMER];
    let mut push = |text: &'static str| {
        if !disclaimers.contains(&text) {
            disclaimers.push(text);
        }
    };

    if flags.contains(&SafetyFlag::Emergency) || flags.contains(&SafetyFlag::Harm) {
        push(EMERGENCY_DISCLAIMER);
    }
    if flags.contains(&SafetyFlag::MedicalAdvice) || flags.contains(&SafetyFlag::Medical) {
        push(MEDICAL_DISCLAIMER);
    }
    if flags.contains(&SafetyFlag::DevelopmentalConcern) {
        push(DEVELOPMENTAL_DISCLAIMER);
    }
    if flags.contains(&SafetyFlag::Harm) || flags.contains(&SafetyFlag::MedicalAdvice) {
        push(PROFESSIONAL_REFERRAL_DISCLAIMER);
    }
    disclaimers
}

/// Append the disclaimers for `flags` after `content`, separated by rules.
pub fn format_with_disclaimers(content: &str, flags: &[SafetyFlag]) -> String {
    if flags.is_empty() {
        return content.to_string();
    }
    let disclaimer_text = disclaimers_for_flags(flags).join("\n\n---\n\n");
    format!("{}\n\n---\n\n{}", content, disclaimer_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_leaves_content_untouched() {
        assert_eq!(format_with_disclaimers("hello", &[]), "hello");
    }

    #[test]
    fn general_disclaimer_always_first() {
        let disclaimers = disclaimers_for_flags(&[SafetyFlag::Medical]);
        assert_eq!(disclaimers[0], GENERAL_DISCLAIMER);
        assert!(disclaimers.contains(&MEDICAL_DISCLAIMER));
    }

    #[test]
    fn harm_gets_emergency_and_referral() {
        let disclaimers = disclaimers_for_flags(&[SafetyFlag::Harm]);
        assert!(disclaimers.contains(&EMERGENCY_DISCLAIMER));
        assert!(disclaimers.contains(&PROFESSIONAL_REFERRAL_DISCLAIMER));
    }

    #[test]
    fn emergency_plus_harm_does_not_duplicate() {
        let disclaimers = disclaimers_for_flags(&[SafetyFlag::Emergency, SafetyFlag::Harm]);
        let emergencies = disclaimers
            .iter()
            .filter(|d| **d == EMERGENCY_DISCLAIMER)
            .count();
        assert_eq!(emergencies, 1);
    }

    #[test]
    fn content_comes_before_disclaimers() {
        let formatted = format_with_disclaimers("advice here", &[SafetyFlag::Medical]);
        assert!(formatted.starts_with("advice here\n\n---\n\n"));
        assert!(formatted.contains("**Important Disclaimer:**"));
    }
}

//! Configuration types.

use std::time::Duration;

/// Assistant configuration.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Assistant name for identification.
    pub name: String,
    /// Whether flagged responses suspend for a human decision.
    ///
    /// When disabled, flagged content is still delivered with disclaimers
    /// appended but never held for review.
    pub human_in_the_loop: bool,
    /// How many days back temporal pattern analysis looks by default.
    pub default_days_back: i64,
    /// How many recent turns the topic detector sees.
    pub topic_context_window: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: "parent-assist".to_string(),
            human_in_the_loop: true,
            default_days_back: 90,
            topic_context_window: 6,
        }
    }
}

/// Retry/timeout policy for external LLM and embedding calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    /// Base backoff between attempts (jittered).
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

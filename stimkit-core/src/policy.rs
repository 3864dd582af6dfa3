use serde::{Deserialize, Serialize};

/// How a display's presentation ends.
///
/// Replaces the symbolic timer-code strings of older toolkits with an
/// enumerated policy the queue can act on directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerPolicy {
    /// Present one frame and retire immediately.
    NoTimer,
    /// Retire after a fixed duration.
    FixedDelay { ms: u64 },
    /// Stay up until a response is collected.
    ReleaseResponse,
    /// Wait for a response, but give up after the deadline.
    ResponseDeadline { ms: u64 },
}

impl TimerPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            TimerPolicy::NoTimer => "no-timer",
            TimerPolicy::FixedDelay { .. } => "fixed-delay",
            TimerPolicy::ReleaseResponse => "release-response",
            TimerPolicy::ResponseDeadline { .. } => "response-deadline",
        }
    }

    /// True when the policy ends on participant input.
    pub fn waits_for_response(&self) -> bool {
        matches!(
            self,
            TimerPolicy::ReleaseResponse | TimerPolicy::ResponseDeadline { .. }
        )
    }

    /// Time-driven retirement bound, if any.
    pub fn deadline_ms(&self) -> Option<u64> {
        match self {
            TimerPolicy::NoTimer | TimerPolicy::ReleaseResponse => None,
            TimerPolicy::FixedDelay { ms } | TimerPolicy::ResponseDeadline { ms } => Some(*ms),
        }
    }
}

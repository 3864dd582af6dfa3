use crate::policy::TimerPolicy;
use serde::{Deserialize, Serialize};

/// One presented display, as written to the session's result file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationRecord {
    pub title: String,
    pub kind: String,
    pub trial: usize,
    pub timer: TimerPolicy,
    pub shown_at_ns: u64,
    pub retired_at_ns: u64,
    pub reaction_time_ns: Option<u64>,
    pub responded: bool,
    pub response_code: Option<u32>,
}

//! Time-of-day / day-of-week policy.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local};

use crate::types::{GovernanceDecision, GovernanceRequest, TimeWindow, Weekday};

use super::Policy;

/// Allow iff `now` (local time) falls within any configured window.
pub struct TemporalPolicy {
    windows: Vec<TimeWindow>,
    default_allow: bool,
    /// Injectable clock for deterministic tests; defaults to `Local::now`.
    now_fn: Box<dyn Fn() -> DateTime<Local> + Send + Sync>,
}

impl TemporalPolicy {
    pub fn new(windows: Vec<TimeWindow>, default_allow: bool) -> Self {
        Self {
            windows,
            default_allow,
            now_fn: Box::new(Local::now),
        }
    }

    /// Build a policy with a fixed clock, for deterministic tests.
    pub fn with_clock(windows: Vec<TimeWindow>, default_allow: bool, now: DateTime<Local>) -> Self {
        Self {
            windows,
            default_allow,
            now_fn: Box::new(move || now),
        }
    }

    fn is_within_window(window: &TimeWindow, now: DateTime<Local>) -> bool {
        let today: Weekday = now.weekday().into();
        if !window.days_of_week.contains(&today) {
            return false;
        }
        let time = now.time();
        time >= window.start && time < window.end
    }
}

#[async_trait]
impl Policy for TemporalPolicy {
    async fn evaluate(&self, _request: &GovernanceRequest) -> GovernanceDecision {
        let now = (self.now_fn)();
        let within_any = self.windows.iter().any(|w| Self::is_within_window(w, now));
        if within_any {
            GovernanceDecision::allow("within allowed time window")
        } else if self.default_allow {
            GovernanceDecision::allow("outside configured windows, default allow")
        } else {
            GovernanceDecision::deny("outside configured windows")
        }
    }

    fn kind(&self) -> &'static str {
        "temporal"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

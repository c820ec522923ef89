//! Deadline pressure.
//!
//! ```text
//! work_days_needed = critical_path_hours / work_hours_per_day
//! slack_days       = hours_until_deadline / 24 - work_days_needed
//! pressure         = slack <= 0 ? critical
//!                  : clamp(k / (slack + offset)^exponent, min, max)
//! ```
//!
//! `k` depends on whether the deadline is hard or soft. Items without a
//! deadline carry a neutral pressure of `min_pressure`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ScoringConfig;
use crate::task::DeadlineKind;

/// Lower bound used in place of a zero-hour working day.
const MIN_WORK_HOURS: f64 = 1e-6;

/// Everything derived from one item's deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlineAssessment {
    pub deadline: DateTime<Utc>,
    pub kind: DeadlineKind,
    /// Deadline came from the parent workflow
    pub inherited: bool,
    pub critical_path_hours: f64,
    pub hours_until_deadline: f64,
    pub work_days_needed: f64,
    pub slack_days: f64,
    pub pressure: f64,
}

impl DeadlineAssessment {
    /// Evaluate a deadline against the remaining critical path.
    pub fn evaluate(
        deadline: DateTime<Utc>,
        kind: DeadlineKind,
        critical_path_minutes: u32,
        now: DateTime<Utc>,
        work_hours_per_day: f64,
        config: &ScoringConfig,
    ) -> Self {
        let critical_path_hours = f64::from(critical_path_minutes) / 60.0;
        let hours_until_deadline = hours_between(now, deadline);
        let work_days_needed = critical_path_hours / work_hours_per_day.max(MIN_WORK_HOURS);
        let slack_days = hours_until_deadline / 24.0 - work_days_needed;
        Self {
            deadline,
            kind,
            inherited: false,
            critical_path_hours,
            hours_until_deadline,
            work_days_needed,
            slack_days,
            pressure: pressure_for_slack(slack_days, kind, config),
        }
    }

    pub fn inherited(mut self, inherited: bool) -> Self {
        self.inherited = inherited;
        self
    }

    pub fn is_critical(&self, config: &ScoringConfig) -> bool {
        self.pressure >= config.critical_pressure
    }
}

/// Signed hours from `from` to `to`.
pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / 3600.0
}

/// Pressure for a given slack. Monotonically non-increasing in slack.
pub fn pressure_for_slack(slack_days: f64, kind: DeadlineKind, config: &ScoringConfig) -> f64 {
    if slack_days <= 0.0 {
        return config.critical_pressure;
    }
    let k = match kind {
        DeadlineKind::Hard => config.hard_deadline_k,
        DeadlineKind::Soft => config.soft_deadline_k,
    };
    let raw = k / (slack_days + config.slack_offset).powf(config.pressure_exponent);
    raw.clamp(config.min_pressure, config.max_pressure)
}

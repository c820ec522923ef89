//! Urgency boost for items that kick off asynchronous work.
//!
//! Starting a trigger early leaves more room for the work that waits on it.
//! The boost grows exponentially with how compressed that downstream work
//! becomes once the wait is subtracted from the time left.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::deadline::hours_between;
use super::ScoringConfig;
use crate::context::WorkIndex;
use crate::task::WorkItem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncAssessment {
    pub dependent_work_hours: f64,
    pub chain_deadline: DateTime<Utc>,
    pub hours_until_deadline: f64,
    pub async_wait_hours: f64,
    pub available_hours_after_wait: f64,
    /// `None` when no working time is left after the wait
    pub compression_ratio: Option<f64>,
    pub urgency: f64,
}

/// Assess an item's async urgency.
///
/// Returns `None` for items that trigger nothing or whose chain carries no
/// deadline; both mean an urgency of zero.
pub fn assess(
    item: &WorkItem,
    index: &WorkIndex,
    now: DateTime<Utc>,
    work_hours_per_day: f64,
    config: &ScoringConfig,
) -> Option<AsyncAssessment> {
    if !item.triggers_async() || item.is_completed() {
        return None;
    }

    let dependents = index.transitive_dependents(item);
    let chain_deadline = std::iter::once(item)
        .chain(dependents.iter().copied())
        .filter_map(|i| i.deadline)
        .min()?;

    let dependent_work_hours = dependents
        .iter()
        .map(|i| f64::from(i.remaining_minutes()))
        .sum::<f64>()
        / 60.0;
    let hours_until_deadline = hours_between(now, chain_deadline);
    let async_wait_hours = f64::from(item.async_wait_time) / 60.0;
    let available_hours_after_wait = hours_until_deadline - async_wait_hours;

    let working_hours_left = available_hours_after_wait * work_hours_per_day / 24.0;
    let compression_ratio = (working_hours_left > 0.0).then(|| dependent_work_hours / working_hours_left);
    let urgency = match compression_ratio {
        Some(ratio) => urgency_for(ratio, hours_until_deadline / 24.0, config),
        None => config.async_critical_urgency,
    };

    Some(AsyncAssessment {
        dependent_work_hours,
        chain_deadline,
        hours_until_deadline,
        async_wait_hours,
        available_hours_after_wait,
        compression_ratio,
        urgency,
    })
}

/// `a·e^(b·ratio) + proximity/(days + 1)`, or the ceiling once the chain no
/// longer fits.
pub fn urgency_for(compression_ratio: f64, days_until_deadline: f64, config: &ScoringConfig) -> f64 {
    if compression_ratio >= 1.0 {
        return config.async_critical_urgency;
    }
    let proximity = config.async_proximity_weight / (days_until_deadline.max(0.0) + 1.0);
    config.async_base * (config.async_growth * compression_ratio).exp() + proximity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SchedulingContext;
    use crate::task::{DeadlineKind, Task};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    #[test]
    fn non_triggers_have_no_urgency() {
        let ctx = SchedulingContext::new(now()).with_task(
            Task::new("t", "T", 30).with_deadline(now() + Duration::days(1), DeadlineKind::Hard),
        );
        let index = WorkIndex::build(&ctx);
        let item = index.item("t").unwrap();
        assert!(assess(item, &index, now(), 7.0, &ScoringConfig::default()).is_none());
    }

    #[test]
    fn trigger_without_chain_deadline_has_no_urgency() {
        let ctx = SchedulingContext::new(now())
            .with_task(Task::new("send", "Send for review", 15).with_async_wait(240))
            .with_task(Task::new("apply", "Apply feedback", 60).depends_on("send"));
        let index = WorkIndex::build(&ctx);
        let item = index.item("send").unwrap();
        assert!(assess(item, &index, now(), 7.0, &ScoringConfig::default()).is_none());
    }

    #[test]
    fn compressed_chain_hits_ceiling() {
        // 2 days out, 24h wait: 24h * 7/24 = 7 working hours left for 10 hours of work
        let ctx = SchedulingContext::new(now())
            .with_task(Task::new("send", "Send", 15).with_async_wait(24 * 60))
            .with_task(
                Task::new("apply", "Apply", 600)
                    .depends_on("send")
                    .with_deadline(now() + Duration::days(2), DeadlineKind::Hard),
            );
        let index = WorkIndex::build(&ctx);
        let a = assess(index.item("send").unwrap(), &index, now(), 7.0, &ScoringConfig::default()).unwrap();
        assert!(a.compression_ratio.unwrap() > 1.0);
        assert_eq!(a.urgency, 500.0);
    }

    #[test]
    fn loose_chain_uses_exponential_curve() {
        let ctx = SchedulingContext::new(now())
            .with_task(Task::new("send", "Send", 15).with_async_wait(60))
            .with_task(
                Task::new("apply", "Apply", 60)
                    .depends_on("send")
                    .with_deadline(now() + Duration::days(9), DeadlineKind::Soft),
            );
        let index = WorkIndex::build(&ctx);
        let a = assess(index.item("send").unwrap(), &index, now(), 7.0, &ScoringConfig::default()).unwrap();
        let ratio = a.compression_ratio.unwrap();
        assert!(ratio < 0.1);
        let expected = 10.0 * (5.0 * ratio).exp() + 5.0 / (9.0 + 1.0);
        assert!((a.urgency - expected).abs() < 1e-9);
    }

    #[test]
    fn wait_past_deadline_is_critical() {
        let ctx = SchedulingContext::new(now())
            .with_task(
                Task::new("send", "Send", 15)
                    .with_async_wait(48 * 60)
                    .with_deadline(now() + Duration::days(1), DeadlineKind::Hard),
            );
        let index = WorkIndex::build(&ctx);
        let a = assess(index.item("send").unwrap(), &index, now(), 7.0, &ScoringConfig::default()).unwrap();
        assert_eq!(a.compression_ratio, None);
        assert_eq!(a.urgency, 500.0);
    }
}

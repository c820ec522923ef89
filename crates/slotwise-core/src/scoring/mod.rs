//! Priority scoring engine.
//!
//! ## Formula
//!
//! ```text
//! priority = (eisenhower × deadline_pressure + async_urgency) × cognitive_match
//!          + context_switch_penalty
//! ```
//!
//! | Term | Source |
//! |------|--------|
//! | eisenhower | `importance × urgency` |
//! | deadline_pressure | [`deadline`], 1.0 without a deadline |
//! | async_urgency | [`async_urgency`], 0 for non-triggers |
//! | cognitive_match | [`cognitive`], productivity level of the hour vs complexity |
//! | context_switch_penalty | `-context_switch_penalty` when the previous item is from another workflow/project |
//!
//! Every term is kept in a [`PriorityBreakdown`] so diagnostics can explain
//! any ordering decision. All constants live in [`ScoringConfig`].

pub mod async_urgency;
pub mod cognitive;
pub mod deadline;

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::context::{SchedulingContext, WorkIndex};
use crate::task::WorkItem;

pub use async_urgency::AsyncAssessment;
pub use cognitive::{ProductivityLevel, ProductivityTable, ProductivityWindow};
pub use deadline::DeadlineAssessment;

/// Tunable scoring constants.
///
/// The defaults are heuristics carried over as-is; they are exposed here so
/// they can be validated and tuned without code changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Pressure numerator for hard deadlines
    pub hard_deadline_k: f64,
    /// Pressure numerator for soft deadlines
    pub soft_deadline_k: f64,
    pub pressure_exponent: f64,
    pub slack_offset: f64,
    pub min_pressure: f64,
    pub max_pressure: f64,
    /// Pressure at or below zero slack
    pub critical_pressure: f64,
    pub async_base: f64,
    pub async_growth: f64,
    pub async_proximity_weight: f64,
    /// Urgency once downstream work no longer fits after the wait
    pub async_critical_urgency: f64,
    pub optimal_match_bonus: f64,
    pub mismatch_step: f64,
    pub min_cognitive_match: f64,
    /// Magnitude subtracted on a workflow/project switch
    pub context_switch_penalty: f64,
    pub productivity: ProductivityTable,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            hard_deadline_k: 10.0,
            soft_deadline_k: 5.0,
            pressure_exponent: 1.5,
            slack_offset: 0.5,
            min_pressure: 1.0,
            max_pressure: 100.0,
            critical_pressure: 1000.0,
            async_base: 10.0,
            async_growth: 5.0,
            async_proximity_weight: 5.0,
            async_critical_urgency: 500.0,
            optimal_match_bonus: 1.2,
            mismatch_step: 0.15,
            min_cognitive_match: 0.7,
            context_switch_penalty: 5.0,
            productivity: ProductivityTable::default(),
        }
    }
}

/// Every sub-score behind one priority value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityBreakdown {
    pub eisenhower: f64,
    pub deadline_pressure: f64,
    pub async_urgency: f64,
    pub productivity_level: ProductivityLevel,
    pub cognitive_match: f64,
    /// Zero or negative
    pub context_switch_penalty: f64,
    pub total: f64,
}

impl PriorityBreakdown {
    fn new(
        eisenhower: f64,
        deadline_pressure: f64,
        async_urgency: f64,
        productivity_level: ProductivityLevel,
        cognitive_match: f64,
    ) -> Self {
        let mut breakdown = Self {
            eisenhower,
            deadline_pressure,
            async_urgency,
            productivity_level,
            cognitive_match,
            context_switch_penalty: 0.0,
            total: 0.0,
        };
        breakdown.recompute();
        breakdown
    }

    fn recompute(&mut self) {
        self.total = (self.eisenhower * self.deadline_pressure + self.async_urgency) * self.cognitive_match
            + self.context_switch_penalty;
    }

    fn with_cognitive(mut self, level: ProductivityLevel, cognitive_match: f64) -> Self {
        self.productivity_level = level;
        self.cognitive_match = cognitive_match;
        self.recompute();
        self
    }

    /// Same breakdown with a different switch penalty applied.
    pub fn with_context_switch(mut self, penalty: f64) -> Self {
        self.context_switch_penalty = penalty;
        self.recompute();
        self
    }
}

/// Scores work items for one run.
#[derive(Debug, Clone)]
pub struct PriorityEngine {
    config: ScoringConfig,
    now: DateTime<Utc>,
    work_hours_per_day: f64,
    offset: FixedOffset,
}

impl PriorityEngine {
    pub fn new(config: ScoringConfig, context: &SchedulingContext) -> Self {
        Self {
            config,
            now: context.current_time,
            work_hours_per_day: context.work_settings.work_hours_per_day(),
            offset: context.work_settings.offset(),
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn work_hours_per_day(&self) -> f64 {
        self.work_hours_per_day
    }

    pub(crate) fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Productivity level at a given instant, in local time.
    pub fn level_at(&self, instant: DateTime<Utc>) -> ProductivityLevel {
        let hour = instant.with_timezone(&self.offset).hour();
        self.config.productivity.level_at(hour)
    }

    pub fn deadline_assessment(&self, item: &WorkItem, index: &WorkIndex) -> Option<DeadlineAssessment> {
        let deadline = item.deadline?;
        let assessment = DeadlineAssessment::evaluate(
            deadline,
            item.deadline_type,
            index.critical_path_minutes(item),
            self.now,
            self.work_hours_per_day,
            &self.config,
        );
        Some(assessment.inherited(item.deadline_inherited))
    }

    pub fn async_assessment(&self, item: &WorkItem, index: &WorkIndex) -> Option<AsyncAssessment> {
        async_urgency::assess(item, index, self.now, self.work_hours_per_day, &self.config)
    }

    /// Breakdown without any context-switch penalty, matched against the
    /// productivity level at `now`.
    pub fn base_breakdown(&self, item: &WorkItem, index: &WorkIndex) -> PriorityBreakdown {
        let pressure = self
            .deadline_assessment(item, index)
            .map(|a| a.pressure)
            .unwrap_or(self.config.min_pressure);
        let urgency = self
            .async_assessment(item, index)
            .map(|a| a.urgency)
            .unwrap_or(0.0);
        let level = self.level_at(self.now);
        let matched = cognitive::cognitive_match(level, item.cognitive_complexity, &self.config);
        PriorityBreakdown::new(item.eisenhower(), pressure, urgency, level, matched)
    }

    /// Penalty for running `item` right after `previous`.
    ///
    /// Items with no workflow or project never count as a switch between
    /// each other.
    pub fn context_switch_penalty(&self, previous: Option<&WorkItem>, item: &WorkItem) -> f64 {
        match previous {
            Some(prev) if prev.context_key != item.context_key => -self.config.context_switch_penalty.abs(),
            _ => 0.0,
        }
    }

    /// `base` re-matched for work starting at `start` right after `previous`.
    pub fn slot_breakdown(
        &self,
        base: &PriorityBreakdown,
        item: &WorkItem,
        start: DateTime<Utc>,
        previous: Option<&WorkItem>,
    ) -> PriorityBreakdown {
        let level = self.level_at(start);
        base.clone()
            .with_cognitive(level, cognitive::cognitive_match(level, item.cognitive_complexity, &self.config))
            .with_context_switch(self.context_switch_penalty(previous, item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{DeadlineKind, Task};
    use crate::workflow::{Workflow, WorkflowStep};
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap()
    }

    #[test]
    fn breakdown_without_deadline_is_eisenhower_times_match() {
        let ctx = SchedulingContext::new(at(10)).with_task(Task::new("t", "T", 30).with_scores(4, 5).with_complexity(5));
        let index = WorkIndex::build(&ctx);
        let engine = PriorityEngine::new(ScoringConfig::default(), &ctx);
        let b = engine.base_breakdown(index.item("t").unwrap(), &index);

        assert_eq!(b.eisenhower, 20.0);
        assert_eq!(b.deadline_pressure, 1.0);
        assert_eq!(b.async_urgency, 0.0);
        assert_eq!(b.productivity_level, ProductivityLevel::Peak);
        assert_eq!(b.cognitive_match, 1.2);
        assert!((b.total - 24.0).abs() < 1e-9);
    }

    #[test]
    fn deadline_pressure_raises_priority() {
        let ctx = SchedulingContext::new(at(10))
            .with_task(Task::new("calm", "Calm", 60))
            .with_task(Task::new("due", "Due", 60).with_deadline(at(10) + Duration::hours(30), DeadlineKind::Hard));
        let index = WorkIndex::build(&ctx);
        let engine = PriorityEngine::new(ScoringConfig::default(), &ctx);
        let calm = engine.base_breakdown(index.item("calm").unwrap(), &index);
        let due = engine.base_breakdown(index.item("due").unwrap(), &index);
        assert!(due.deadline_pressure > 1.0);
        assert!(due.total > calm.total);
    }

    #[test]
    fn context_switch_is_subtracted() {
        let ctx = SchedulingContext::new(at(10))
            .with_task(Task::new("a", "A", 30).in_project("p1"))
            .with_task(Task::new("b", "B", 30).in_project("p2"))
            .with_task(Task::new("c", "C", 30).in_project("p1"));
        let index = WorkIndex::build(&ctx);
        let engine = PriorityEngine::new(ScoringConfig::default(), &ctx);
        let a = index.item("a").unwrap();
        let b = index.item("b").unwrap();
        let c = index.item("c").unwrap();

        let base = engine.base_breakdown(b, &index);
        let switched = engine.slot_breakdown(&base, b, at(10), Some(a));
        assert_eq!(switched.context_switch_penalty, -5.0);
        assert!((switched.total - (base.total - 5.0)).abs() < 1e-9);
        assert_eq!(engine.context_switch_penalty(Some(a), c), 0.0);
        assert_eq!(engine.context_switch_penalty(None, c), 0.0);
    }

    #[test]
    fn slot_breakdown_matches_level_of_the_slot() {
        let ctx = SchedulingContext::new(at(10)).with_task(Task::new("t", "T", 30).with_scores(4, 5).with_complexity(5));
        let index = WorkIndex::build(&ctx);
        let engine = PriorityEngine::new(ScoringConfig::default(), &ctx);
        let item = index.item("t").unwrap();
        let base = engine.base_breakdown(item, &index);

        let afternoon = engine.slot_breakdown(&base, item, at(14), None);
        assert_eq!(afternoon.productivity_level, ProductivityLevel::Moderate);
        // |2 - 5| = 3 -> 0.55, floored
        assert_eq!(afternoon.cognitive_match, 0.7);
        assert!((afternoon.total - 14.0).abs() < 1e-9);
        assert_eq!(engine.slot_breakdown(&base, item, at(10), None), base);
    }

    #[test]
    fn inherited_workflow_deadline_feeds_pressure() {
        let ctx = SchedulingContext::new(at(9)).with_workflow(
            Workflow::new("wf", "Launch")
                .with_deadline(at(9) + Duration::hours(3), DeadlineKind::Hard)
                .with_step(WorkflowStep::new("s1", "Draft", 120))
                .with_step(WorkflowStep::new("s2", "Ship", 120).depends_on("s1")),
        );
        let index = WorkIndex::build(&ctx);
        let engine = PriorityEngine::new(ScoringConfig::default(), &ctx);
        let a = engine.deadline_assessment(index.item("s1").unwrap(), &index).unwrap();
        assert!(a.inherited);
        assert_eq!(a.critical_path_hours, 4.0);
        // 3h / 24 = 0.125 days vs 4h / 7h = 0.57 days of work
        assert_eq!(a.pressure, 1000.0);
    }
}

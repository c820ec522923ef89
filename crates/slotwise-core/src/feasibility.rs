//! Deadline feasibility pre-pass.
//!
//! Runs before placement over every open hard deadline: standalone tasks,
//! whole workflows, and steps carrying a deadline of their own. A deadline
//! whose pressure reaches the critical value is reported as an
//! `impossible_deadline` failure with remediation. The pass never stops the
//! allocator from trying; infeasible items surface again as unscheduled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::{SchedulingContext, WorkIndex};
use crate::scheduler::calendar::Calendar;
use crate::scheduler::result::{
    CapacityShortfall, DeferCandidate, FailureType, Remediation, SchedulingFailure, Severity,
};
use crate::scoring::{DeadlineAssessment, PriorityEngine};
use crate::task::{DeadlineKind, TaskType, WorkItem};

/// Outcome for one hard deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlineCheck {
    /// Task, step or workflow id
    pub target_id: String,
    pub name: String,
    pub is_workflow: bool,
    pub assessment: DeadlineAssessment,
    pub feasible: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityReport {
    pub checks: Vec<DeadlineCheck>,
    pub failures: Vec<SchedulingFailure>,
}

impl FeasibilityReport {
    pub fn is_feasible(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn has_failure_for(&self, target_id: &str) -> bool {
        self.failures.iter().any(|f| f.item_id == target_id)
    }
}

pub struct FeasibilityAnalyzer<'a> {
    engine: &'a PriorityEngine,
    index: &'a WorkIndex,
    calendar: &'a Calendar,
    max_defer_candidates: usize,
}

impl<'a> FeasibilityAnalyzer<'a> {
    pub fn new(engine: &'a PriorityEngine, index: &'a WorkIndex, calendar: &'a Calendar) -> Self {
        Self {
            engine,
            index,
            calendar,
            max_defer_candidates: 3,
        }
    }

    pub fn with_max_defer_candidates(mut self, max: usize) -> Self {
        self.max_defer_candidates = max;
        self
    }

    pub fn analyze(&self, context: &SchedulingContext) -> FeasibilityReport {
        let mut report = FeasibilityReport::default();

        for item in self.index.items() {
            let own_deadline = !item.deadline_inherited && item.deadline_type == DeadlineKind::Hard;
            if item.is_completed() || !own_deadline {
                continue;
            }
            if let Some(deadline) = item.deadline {
                let chain = self.index.deadline_chain(item);
                self.check(&mut report, &item.id, &item.name, false, deadline, &chain);
            }
        }

        for workflow in &context.workflows {
            if workflow.deadline_type != DeadlineKind::Hard || workflow.is_completed() {
                continue;
            }
            let Some(deadline) = workflow.deadline else { continue };
            let chain = self.index.workflow_items(&workflow.id);
            self.check(&mut report, &workflow.id, &workflow.name, true, deadline, &chain);
        }

        report
    }

    fn check(
        &self,
        report: &mut FeasibilityReport,
        target_id: &str,
        name: &str,
        is_workflow: bool,
        deadline: DateTime<Utc>,
        chain: &[&WorkItem],
    ) {
        let critical_path: u32 = chain.iter().map(|i| i.remaining_minutes()).sum();
        let assessment = DeadlineAssessment::evaluate(
            deadline,
            DeadlineKind::Hard,
            critical_path,
            self.engine.now(),
            self.engine.work_hours_per_day(),
            self.engine.config(),
        );
        let feasible = !assessment.is_critical(self.engine.config());

        if !feasible {
            tracing::warn!(
                target = target_id,
                slack_days = assessment.slack_days,
                "hard deadline cannot be met"
            );
            report.failures.push(SchedulingFailure {
                failure_type: FailureType::ImpossibleDeadline,
                severity: Severity::Hard,
                item_id: target_id.to_string(),
                message: format!(
                    "'{name}' needs {:.1}h of work but its deadline is {:.1}h away ({:.2} days of slack)",
                    assessment.critical_path_hours, assessment.hours_until_deadline, assessment.slack_days
                ),
                remediation: self.remediation(&assessment, chain),
            });
        }

        report.checks.push(DeadlineCheck {
            target_id: target_id.to_string(),
            name: name.to_string(),
            is_workflow,
            assessment,
            feasible,
        });
    }

    /// Remediation for a deadline whose chain of work is `chain`.
    pub fn remediation(&self, assessment: &DeadlineAssessment, chain: &[&WorkItem]) -> Remediation {
        let minimum_extension_hours = (assessment.critical_path_hours - assessment.hours_until_deadline)
            .ceil()
            .max(0.0) as u32;
        let capacity_extension_hours = (-assessment.slack_days * 24.0).ceil().max(0.0) as u32;

        let (focus_needed, admin_needed) = WorkIndex::lane_minutes(chain.iter().copied());
        let now = self.engine.now();
        let shortfall_hours = |lane: TaskType, needed: u32| {
            let available = self.calendar.lane_capacity_between(lane, now, assessment.deadline);
            f64::from(needed.saturating_sub(available)) / 60.0
        };

        Remediation {
            defer_candidates: self.defer_candidates(chain),
            minimum_extension_hours,
            capacity_extension_hours,
            shortfall: CapacityShortfall {
                focus_hours: shortfall_hours(TaskType::Focused, focus_needed),
                admin_hours: shortfall_hours(TaskType::Admin, admin_needed),
            },
            blocking_dependencies: Vec::new(),
        }
    }

    /// Lowest Eisenhower open items outside `chain`, ties by id.
    pub fn defer_candidates(&self, chain: &[&WorkItem]) -> Vec<DeferCandidate> {
        let mut candidates: Vec<&WorkItem> = self
            .index
            .items()
            .iter()
            .filter(|i| !i.is_completed() && i.remaining_minutes() > 0)
            .filter(|i| !chain.iter().any(|c| c.id == i.id))
            .collect();
        candidates.sort_by(|a, b| a.eisenhower().total_cmp(&b.eisenhower()).then_with(|| a.id.cmp(&b.id)));
        candidates
            .into_iter()
            .take(self.max_defer_candidates)
            .map(|i| DeferCandidate {
                item_id: i.id.clone(),
                name: i.name.clone(),
                eisenhower: i.eisenhower(),
                remaining_minutes: i.remaining_minutes(),
            })
            .collect()
    }
}

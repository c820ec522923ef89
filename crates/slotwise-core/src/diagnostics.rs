//! Scheduling diagnostics.
//!
//! Turns the allocator's decisions and the feasibility pre-pass into the
//! final [`SchedulingResult`]: block utilization, failures with
//! remediation, warnings, suggestions and a content fingerprint. This is
//! the only place a run explains itself; nothing here returns an error.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::context::WorkIndex;
use crate::feasibility::{FeasibilityAnalyzer, FeasibilityReport};
use crate::scheduler::allocator::Allocation;
use crate::scheduler::calendar::Calendar;
use crate::scheduler::result::{
    BlockUtilization, CapacityShortfall, FailureType, Remediation, ScheduleSummary, ScheduledItem,
    SchedulingFailure, SchedulingResult, SchedulingSuggestion, SchedulingWarning, Severity,
    SuggestionType, UnscheduledItem, UnscheduledReason, UtilizationClass, WarningType,
};
use crate::scoring::cognitive::{is_mismatch, ProductivityLevel};
use crate::scoring::PriorityEngine;
use crate::task::{DeadlineKind, TaskType, WorkItem};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Defer suggestions per failure
    pub max_defer_candidates: usize,
    /// Percentage at which a block counts as fully utilized
    pub full_utilization_percent: f64,
    /// Fraction of a lane ceiling that triggers a day-load warning
    pub day_load_warning_ratio: f64,
    pub max_context_switches_per_day: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            max_defer_candidates: 3,
            full_utilization_percent: 95.0,
            day_load_warning_ratio: 0.9,
            max_context_switches_per_day: 4,
        }
    }
}

pub struct DiagnosticsReporter<'a> {
    config: &'a DiagnosticsConfig,
    engine: &'a PriorityEngine,
    index: &'a WorkIndex,
    calendar: &'a Calendar,
}

impl<'a> DiagnosticsReporter<'a> {
    pub fn new(
        config: &'a DiagnosticsConfig,
        engine: &'a PriorityEngine,
        index: &'a WorkIndex,
        calendar: &'a Calendar,
    ) -> Self {
        Self {
            config,
            engine,
            index,
            calendar,
        }
    }

    pub fn report(&self, allocation: Allocation, feasibility: FeasibilityReport) -> SchedulingResult {
        let utilization = self.utilization(&allocation);

        let mut unscheduled = allocation.unscheduled.clone();
        unscheduled.sort_by(|a, b| b.priority.total_cmp(&a.priority).then_with(|| a.item_id.cmp(&b.item_id)));

        let mut failures = feasibility.failures;
        for entry in &unscheduled {
            if let Some(failure) = self.failure_for(entry, &failures) {
                failures.push(failure);
            }
        }

        let mut warnings = self.integrity_warnings();
        warnings.extend(self.capacity_warnings(&allocation));
        warnings.extend(self.deadline_warnings(&allocation.scheduled, &unscheduled));
        warnings.extend(self.cognitive_warnings(&allocation.scheduled));

        let mut suggestions = self.async_suggestions(&allocation.scheduled);
        suggestions.extend(self.cognitive_suggestions(&allocation.scheduled));
        suggestions.extend(self.context_switch_suggestions(&allocation.scheduled));

        let work: Vec<&ScheduledItem> = allocation.scheduled.iter().filter(|s| s.is_work()).collect();
        let summary = ScheduleSummary {
            total_items: self.index.items().iter().filter(|i| !i.is_completed()).count(),
            scheduled_items: work.len(),
            unscheduled_items: unscheduled.len(),
            scheduled_minutes: work.iter().map(|s| s.duration_minutes().max(0) as u32).sum(),
            failures: failures.len(),
            warnings: warnings.len(),
            horizon_start: self.calendar.dates().first().copied(),
            horizon_end: self.calendar.dates().last().copied(),
        };

        let mut result = SchedulingResult {
            generated_at: self.engine.now(),
            scheduled: allocation.scheduled,
            unscheduled,
            warnings,
            failures,
            suggestions,
            utilization,
            summary,
            fingerprint: String::new(),
        };
        result.fingerprint = fingerprint(&result);
        result
    }

    fn utilization(&self, allocation: &Allocation) -> Vec<BlockUtilization> {
        self.calendar
            .blocks()
            .iter()
            .enumerate()
            .map(|(idx, block)| {
                let used = allocation.block_usage.get(idx).copied().unwrap_or_default();
                let capacity = block.capacity.total();
                let percentage = if capacity == 0 {
                    0.0
                } else {
                    f64::from(used.total()) / f64::from(capacity) * 100.0
                };
                let classification = if used.total() == 0 {
                    UtilizationClass::NotUtilized
                } else if percentage >= self.config.full_utilization_percent {
                    UtilizationClass::FullyUtilized
                } else {
                    UtilizationClass::PartiallyUtilized
                };
                BlockUtilization {
                    block_id: block.id.clone(),
                    date: block.date,
                    block_type: block.block_type,
                    focus_used: used.focus,
                    focus_capacity: block.capacity.focus_minutes,
                    admin_used: used.admin,
                    admin_capacity: block.capacity.admin_minutes,
                    used_minutes: used.total(),
                    capacity_minutes: capacity,
                    percentage,
                    classification,
                }
            })
            .collect()
    }

    fn analyzer(&self) -> FeasibilityAnalyzer<'_> {
        FeasibilityAnalyzer::new(self.engine, self.index, self.calendar)
            .with_max_defer_candidates(self.config.max_defer_candidates)
    }

    /// Failure for an unscheduled item, unless an impossible-deadline
    /// failure already covers it or its workflow.
    fn failure_for(&self, entry: &UnscheduledItem, existing: &[SchedulingFailure]) -> Option<SchedulingFailure> {
        let item = self.index.item(&entry.item_id)?;
        let covered = existing.iter().any(|f| {
            f.failure_type == FailureType::ImpossibleDeadline
                && (f.item_id == item.id || (item.deadline_inherited && item.workflow_id() == Some(f.item_id.as_str())))
        });
        if covered {
            return None;
        }
        let severity = if item.deadline.is_some() && item.deadline_type == DeadlineKind::Hard {
            Severity::Hard
        } else {
            Severity::Soft
        };

        match entry.reason {
            UnscheduledReason::CapacityExceeded => {
                let chain = self.index.deadline_chain(item);
                let (focus, admin) = WorkIndex::lane_minutes([item]);
                Some(SchedulingFailure {
                    failure_type: FailureType::CapacityExceeded,
                    severity,
                    item_id: item.id.clone(),
                    message: format!("'{}' does not fit anywhere in the horizon: {}", item.name, entry.detail),
                    remediation: Remediation {
                        defer_candidates: self.analyzer().defer_candidates(&chain),
                        shortfall: CapacityShortfall {
                            focus_hours: f64::from(focus) / 60.0,
                            admin_hours: f64::from(admin) / 60.0,
                        },
                        ..Remediation::default()
                    },
                })
            }
            UnscheduledReason::DependencyConflict => Some(SchedulingFailure {
                failure_type: FailureType::DependencyConflict,
                severity,
                item_id: item.id.clone(),
                message: format!("'{}' {}", item.name, entry.detail),
                remediation: Remediation {
                    blocking_dependencies: entry.blocking_dependencies.clone(),
                    ..Remediation::default()
                },
            }),
            UnscheduledReason::DeadlineUnreachable => {
                let assessment = self.engine.deadline_assessment(item, self.index)?;
                let chain = self.index.deadline_chain(item);
                Some(SchedulingFailure {
                    failure_type: FailureType::ImpossibleDeadline,
                    severity: Severity::Hard,
                    item_id: item.id.clone(),
                    message: format!("'{}' cannot finish before its deadline: {}", item.name, entry.detail),
                    remediation: self.analyzer().remediation(&assessment, &chain),
                })
            }
        }
    }

    fn integrity_warnings(&self) -> Vec<SchedulingWarning> {
        self.index
            .notes()
            .iter()
            .chain(self.calendar.notes())
            .map(|note| {
                let warning = SchedulingWarning::new(WarningType::DataIntegrity, note.message.clone());
                match &note.item_id {
                    Some(id) => warning.for_item(id.clone()),
                    None => warning,
                }
            })
            .collect()
    }

    fn capacity_warnings(&self, allocation: &Allocation) -> Vec<SchedulingWarning> {
        let mut warnings: Vec<SchedulingWarning> = self
            .calendar
            .excesses()
            .iter()
            .map(|excess| {
                SchedulingWarning::new(
                    WarningType::CapacityWarning,
                    format!(
                        "{} {} minutes declared against a {} minute ceiling",
                        excess.declared_minutes, excess.lane, excess.ceiling_minutes
                    ),
                )
                .on(excess.date)
            })
            .collect();

        for (date, usage) in &allocation.day_usage {
            for lane in [TaskType::Focused, TaskType::Admin] {
                let ceiling = self.calendar.ceiling_minutes(lane);
                if ceiling == 0 {
                    continue;
                }
                let used = usage.get(lane);
                if f64::from(used) >= f64::from(ceiling) * self.config.day_load_warning_ratio {
                    warnings.push(
                        SchedulingWarning::new(
                            WarningType::CapacityWarning,
                            format!("{used} of {ceiling} {lane} minutes booked"),
                        )
                        .on(*date),
                    );
                }
            }
        }
        warnings
    }

    fn deadline_warnings(&self, scheduled: &[ScheduledItem], unscheduled: &[UnscheduledItem]) -> Vec<SchedulingWarning> {
        let late = scheduled.iter().filter(|s| s.is_work()).filter_map(|s| {
            let deadline = s.deadline?;
            (s.deadline_type == Some(DeadlineKind::Soft) && s.end_time > deadline).then(|| {
                SchedulingWarning::new(
                    WarningType::SoftDeadlineRisk,
                    format!("'{}' ends {} after its soft deadline {}", s.name, s.end_time, deadline),
                )
                .for_item(s.source_id.clone())
                .on(s.date)
            })
        });

        let missing = unscheduled.iter().filter_map(|u| {
            let item = self.index.item(&u.item_id)?;
            (item.deadline.is_some() && item.deadline_type == DeadlineKind::Soft).then(|| {
                SchedulingWarning::new(
                    WarningType::SoftDeadlineRisk,
                    format!("'{}' has a soft deadline but was not scheduled ({})", item.name, u.reason),
                )
                .for_item(item.id.clone())
            })
        });

        late.chain(missing).collect()
    }

    fn cognitive_warnings(&self, scheduled: &[ScheduledItem]) -> Vec<SchedulingWarning> {
        self.mismatches(scheduled)
            .map(|(slot, item)| {
                SchedulingWarning::new(
                    WarningType::CognitiveMismatch,
                    format!(
                        "'{}' (complexity {}) placed in a low-productivity slot at {}",
                        item.name,
                        item.cognitive_complexity,
                        slot.start_time.with_timezone(&self.engine.offset()).format("%H:%M")
                    ),
                )
                .for_item(item.id.clone())
                .on(slot.date)
            })
            .collect()
    }

    fn mismatches<'s>(
        &'s self,
        scheduled: &'s [ScheduledItem],
    ) -> impl Iterator<Item = (&'s ScheduledItem, &'s WorkItem)> + 's {
        scheduled.iter().filter(|s| s.is_work()).filter_map(move |s| {
            let item = self.index.item(&s.source_id)?;
            is_mismatch(self.engine.level_at(s.start_time), item.cognitive_complexity).then_some((s, item))
        })
    }

    fn async_suggestions(&self, scheduled: &[ScheduledItem]) -> Vec<SchedulingSuggestion> {
        let work: Vec<&ScheduledItem> = scheduled.iter().filter(|s| s.is_work()).collect();
        work.iter()
            .filter_map(|s| {
                let item = self.index.item(&s.source_id)?;
                if !item.triggers_async() || item.async_wait_time == 0 {
                    return None;
                }
                let priority = s.priority.unwrap_or(0.0);
                let earlier = work
                    .iter()
                    .filter(|other| other.start_time < s.start_time && other.priority.unwrap_or(0.0) < priority)
                    .count();
                (earlier > 0).then(|| SchedulingSuggestion {
                    suggestion_type: SuggestionType::AsyncOptimization,
                    message: format!(
                        "start '{}' earlier; its {} minute wait could overlap {earlier} lower-priority item(s) placed before it",
                        item.name, item.async_wait_time
                    ),
                    item_id: Some(item.id.clone()),
                    date: Some(s.date),
                })
            })
            .collect()
    }

    fn cognitive_suggestions(&self, scheduled: &[ScheduledItem]) -> Vec<SchedulingSuggestion> {
        self.mismatches(scheduled)
            .filter_map(|(slot, item)| {
                let peak = self.calendar.blocks().iter().find(|block| {
                    block.start > slot.start_time
                        && block.lane_capacity(item.task_type) >= item.remaining_minutes()
                        && self.engine.level_at(block.start) == ProductivityLevel::Peak
                })?;
                Some(SchedulingSuggestion {
                    suggestion_type: SuggestionType::CognitiveLoad,
                    message: format!(
                        "move '{}' to the peak block '{}' on {}",
                        item.name, peak.id, peak.date
                    ),
                    item_id: Some(item.id.clone()),
                    date: Some(slot.date),
                })
            })
            .collect()
    }

    fn context_switch_suggestions(&self, scheduled: &[ScheduledItem]) -> Vec<SchedulingSuggestion> {
        let mut by_day: BTreeMap<NaiveDate, Vec<Option<&str>>> = BTreeMap::new();
        for slot in scheduled.iter().filter(|s| s.is_work()) {
            let key = self
                .index
                .item(&slot.source_id)
                .and_then(|i| i.context_key.as_deref());
            by_day.entry(slot.date).or_default().push(key);
        }

        by_day
            .into_iter()
            .filter_map(|(date, keys)| {
                let switches = keys.windows(2).filter(|pair| pair[0] != pair[1]).count();
                (switches > self.config.max_context_switches_per_day).then(|| SchedulingSuggestion {
                    suggestion_type: SuggestionType::ContextSwitch,
                    message: format!(
                        "{switches} context switches on {date}; group work from the same workflow or project"
                    ),
                    item_id: None,
                    date: Some(date),
                })
            })
            .collect()
    }
}

/// Hex SHA-256 of the result serialized with an empty fingerprint.
pub fn fingerprint(result: &SchedulingResult) -> String {
    let mut unsigned = result.clone();
    unsigned.fingerprint.clear();
    match serde_json::to_vec(&unsigned) {
        Ok(bytes) => hex::encode(Sha256::digest(&bytes)),
        Err(e) => {
            tracing::warn!("failed to serialize result for fingerprint: {e}");
            String::new()
        }
    }
}

//! Block allocator.
//!
//! Greedy placement over a shrinking ready set:
//!
//! 1. An item is ready once every dependency is completed or already placed
//!    in this run.
//! 2. Among ready items the highest priority wins. The cognitive match is
//!    taken at the item's candidate slot and the context-switch penalty
//!    relative to the item placed just before. Ties go to the shallower
//!    dependency level, then to the lower id.
//! 3. The winner goes into the earliest gap, at or after its earliest start,
//!    in a block whose lane still has room and whose day is under the lane
//!    ceiling. Meetings are carved out up front and never move.
//!
//! Items that never become ready are reported as dependency conflicts.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::calendar::{free_gaps, Calendar, Interval};
use super::result::{ScheduledItem, ScheduledKind, UnscheduledItem, UnscheduledReason};
use super::stable_id;
use crate::context::WorkIndex;
use crate::scoring::{PriorityBreakdown, PriorityEngine};
use crate::task::{DeadlineKind, TaskType, WorkItem};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Emit an `is_wait_time` entry after every placed async trigger
    pub emit_wait_entries: bool,
    /// Emit meetings and blocked time as `is_blocked` entries
    pub include_meetings: bool,
    /// Cap each day's lane usage at the work-settings ceilings
    pub enforce_day_ceilings: bool,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            emit_wait_entries: true,
            include_meetings: true,
            enforce_day_ceilings: true,
        }
    }
}

/// Minutes consumed per lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneUsage {
    pub focus: u32,
    pub admin: u32,
}

impl LaneUsage {
    pub fn get(&self, lane: TaskType) -> u32 {
        match lane {
            TaskType::Focused => self.focus,
            TaskType::Admin => self.admin,
        }
    }

    fn add(&mut self, lane: TaskType, minutes: u32) {
        match lane {
            TaskType::Focused => self.focus += minutes,
            TaskType::Admin => self.admin += minutes,
        }
    }

    pub fn total(&self) -> u32 {
        self.focus + self.admin
    }
}

/// Everything the allocator decided, for the diagnostics reporter.
#[derive(Debug, Clone, Default)]
pub struct Allocation {
    /// Ordered by start time, then id
    pub scheduled: Vec<ScheduledItem>,
    /// In decision order
    pub unscheduled: Vec<UnscheduledItem>,
    /// Parallel to `Calendar::blocks`; block ids repeat across days
    pub block_usage: Vec<LaneUsage>,
    pub day_usage: BTreeMap<NaiveDate, LaneUsage>,
}

struct Slot {
    block: usize,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Run-local mutable bookkeeping.
#[derive(Default)]
struct Ledger {
    occupied: Vec<Interval>,
    block_usage: Vec<LaneUsage>,
    day_usage: BTreeMap<NaiveDate, LaneUsage>,
    /// Item id -> instant its dependents may start
    released_at: HashMap<String, DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct BlockAllocator {
    config: AllocatorConfig,
}

impl BlockAllocator {
    pub fn new(config: AllocatorConfig) -> Self {
        Self { config }
    }

    pub fn allocate(&self, engine: &PriorityEngine, index: &WorkIndex, calendar: &Calendar) -> Allocation {
        let now = engine.now();
        let mut ledger = Ledger {
            occupied: calendar.busy_intervals().collect(),
            block_usage: vec![LaneUsage::default(); calendar.blocks().len()],
            ..Ledger::default()
        };
        let mut allocation = Allocation::default();

        if self.config.include_meetings {
            allocation.scheduled.extend(calendar.busy().iter().map(|b| ScheduledItem {
                id: b.id.clone(),
                source_id: b.source_id.clone(),
                name: b.name.clone(),
                kind: ScheduledKind::Meeting,
                workflow_id: None,
                priority: None,
                breakdown: None,
                start_time: b.start,
                end_time: b.end,
                date: b.date,
                block_id: None,
                lane: None,
                is_wait_time: false,
                is_blocked: true,
                meeting_kind: Some(b.kind),
                deadline: None,
                deadline_type: None,
                segment: b.segment,
            }));
        }

        let base: BTreeMap<&str, PriorityBreakdown> = index
            .items()
            .iter()
            .filter(|i| !i.is_completed())
            .map(|i| (i.id.as_str(), engine.base_breakdown(i, index)))
            .collect();
        let mut pending: BTreeSet<&str> = base.keys().copied().collect();
        let mut previous: Option<&WorkItem> = None;

        loop {
            let ready = pending
                .iter()
                .filter_map(|id| index.item(id))
                .filter(|item| self.is_ready(item, index, &ledger));

            let mut best: Option<(&WorkItem, PriorityBreakdown)> = None;
            for item in ready {
                let Some(breakdown) = base.get(item.id.as_str()) else { continue };
                let start = self.candidate_start(item, index, calendar, &ledger, now);
                let breakdown = engine.slot_breakdown(breakdown, item, start, previous);
                let better = match &best {
                    None => true,
                    Some((current, current_breakdown)) => breakdown
                        .total
                        .total_cmp(&current_breakdown.total)
                        .then_with(|| index.level(&current.id).cmp(&index.level(&item.id)))
                        .then_with(|| current.id.cmp(&item.id))
                        .is_gt(),
                };
                if better {
                    best = Some((item, breakdown));
                }
            }
            let Some((item, breakdown)) = best else { break };
            pending.remove(item.id.as_str());

            let earliest = self.earliest_start(item, index, &ledger, now);
            match self.place(item, earliest, now, calendar, &ledger) {
                Ok(slot) => {
                    let block = calendar.blocks().get(slot.block);
                    tracing::debug!(
                        item = %item.id,
                        start = %slot.start,
                        block = block.map(|b| b.id.as_str()).unwrap_or("-"),
                        priority = breakdown.total,
                        "placed"
                    );
                    self.record(item, breakdown, slot, calendar, &mut ledger, &mut allocation);
                    previous = Some(item);
                }
                Err((reason, detail)) => {
                    tracing::debug!(item = %item.id, %reason, "not placed");
                    allocation.unscheduled.push(UnscheduledItem {
                        item_id: item.id.clone(),
                        name: item.name.clone(),
                        reason,
                        priority: breakdown.total,
                        breakdown,
                        blocking_dependencies: Vec::new(),
                        detail,
                    });
                }
            }
        }

        for id in pending {
            let Some(item) = index.item(id) else { continue };
            let blocking: Vec<String> = index
                .dependencies(item)
                .into_iter()
                .filter(|dep| !dep.is_completed() && !ledger.released_at.contains_key(&dep.id))
                .map(|dep| dep.id.clone())
                .collect();
            let breakdown = base.get(id).cloned().unwrap_or_else(|| engine.base_breakdown(item, index));
            allocation.unscheduled.push(UnscheduledItem {
                item_id: item.id.clone(),
                name: item.name.clone(),
                reason: UnscheduledReason::DependencyConflict,
                priority: breakdown.total,
                breakdown,
                detail: format!("waits on {} which could not be scheduled", blocking.join(", ")),
                blocking_dependencies: blocking,
            });
        }

        allocation
            .scheduled
            .sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        allocation.block_usage = ledger.block_usage;
        allocation.day_usage = ledger.day_usage;
        allocation
    }

    fn is_ready(&self, item: &WorkItem, index: &WorkIndex, ledger: &Ledger) -> bool {
        index
            .dependencies(item)
            .iter()
            .all(|dep| dep.is_completed() || ledger.released_at.contains_key(&dep.id))
    }

    /// Later of `now` and the release time of every placed dependency.
    fn earliest_start(&self, item: &WorkItem, index: &WorkIndex, ledger: &Ledger, now: DateTime<Utc>) -> DateTime<Utc> {
        index
            .dependencies(item)
            .iter()
            .filter_map(|dep| ledger.released_at.get(&dep.id))
            .fold(now, |acc, &at| acc.max(at))
    }

    /// Where `item` would start if it won this round.
    fn candidate_start(
        &self,
        item: &WorkItem,
        index: &WorkIndex,
        calendar: &Calendar,
        ledger: &Ledger,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let earliest = self.earliest_start(item, index, ledger, now);
        match item.remaining_minutes() {
            0 => earliest,
            minutes => self
                .find_slot(item.task_type, minutes, earliest, calendar, ledger)
                .map(|slot| slot.start)
                .unwrap_or(earliest),
        }
    }

    fn place(
        &self,
        item: &WorkItem,
        earliest: DateTime<Utc>,
        now: DateTime<Utc>,
        calendar: &Calendar,
        ledger: &Ledger,
    ) -> Result<Slot, (UnscheduledReason, String)> {
        let hard_deadline = item.deadline.filter(|_| item.deadline_type == DeadlineKind::Hard);
        if let Some(deadline) = hard_deadline {
            if deadline <= now {
                return Err((
                    UnscheduledReason::DeadlineUnreachable,
                    format!("hard deadline {deadline} has already passed"),
                ));
            }
        }

        let minutes = item.remaining_minutes();
        if minutes == 0 {
            if let Some(deadline) = hard_deadline.filter(|d| *d < earliest) {
                return Err((
                    UnscheduledReason::DeadlineUnreachable,
                    format!("dependencies release it at {earliest}, after hard deadline {deadline}"),
                ));
            }
            return Ok(Slot {
                block: usize::MAX,
                start: earliest,
                end: earliest,
            });
        }

        let Some(slot) = self.find_slot(item.task_type, minutes, earliest, calendar, ledger) else {
            return Err((
                UnscheduledReason::CapacityExceeded,
                format!("no {} capacity for {minutes} minutes after {earliest}", item.task_type),
            ));
        };

        if let Some(deadline) = hard_deadline {
            if slot.end > deadline {
                return Err((
                    UnscheduledReason::DeadlineUnreachable,
                    format!("earliest slot ends {} after hard deadline {deadline}", slot.end),
                ));
            }
        }
        Ok(slot)
    }

    fn find_slot(
        &self,
        lane: TaskType,
        minutes: u32,
        earliest: DateTime<Utc>,
        calendar: &Calendar,
        ledger: &Ledger,
    ) -> Option<Slot> {
        let needed = Duration::minutes(i64::from(minutes));
        let ceiling = calendar.ceiling_minutes(lane);

        for (idx, block) in calendar.blocks().iter().enumerate() {
            if block.end <= earliest {
                continue;
            }
            let used = ledger.block_usage[idx].get(lane);
            if used + minutes > block.lane_capacity(lane) {
                continue;
            }
            if self.config.enforce_day_ceilings {
                let day_used = ledger.day_usage.get(&block.date).map(|u| u.get(lane)).unwrap_or(0);
                if day_used + minutes > ceiling {
                    continue;
                }
            }

            let from = block.start.max(earliest);
            let gap = free_gaps(from, block.end, &ledger.occupied)
                .into_iter()
                .find(|(start, end)| *end - *start >= needed);
            if let Some((start, _)) = gap {
                return Some(Slot {
                    block: idx,
                    start,
                    end: start + needed,
                });
            }
        }
        None
    }

    fn record(
        &self,
        item: &WorkItem,
        breakdown: PriorityBreakdown,
        slot: Slot,
        calendar: &Calendar,
        ledger: &mut Ledger,
        allocation: &mut Allocation,
    ) {
        let block = calendar.blocks().get(slot.block);
        let minutes = item.remaining_minutes();
        if let Some(block) = block {
            ledger.occupied.push((slot.start, slot.end));
            ledger.block_usage[slot.block].add(item.task_type, minutes);
            ledger.day_usage.entry(block.date).or_default().add(item.task_type, minutes);
        }
        let date = block.map(|b| b.date).unwrap_or_else(|| slot.start.date_naive());

        let wait = if item.triggers_async() {
            Duration::minutes(i64::from(item.async_wait_time))
        } else {
            Duration::zero()
        };
        ledger.released_at.insert(item.id.clone(), slot.end + wait);

        let kind = if item.is_workflow_step() {
            ScheduledKind::WorkflowStep
        } else {
            ScheduledKind::Task
        };
        allocation.scheduled.push(ScheduledItem {
            id: stable_id(&format!("item:{}:{}", item.id, slot.start.timestamp())),
            source_id: item.id.clone(),
            name: item.name.clone(),
            kind,
            workflow_id: item.workflow_id().map(str::to_string),
            priority: Some(breakdown.total),
            breakdown: Some(breakdown),
            start_time: slot.start,
            end_time: slot.end,
            date,
            block_id: block.map(|b| b.id.clone()),
            lane: Some(item.task_type),
            is_wait_time: false,
            is_blocked: false,
            meeting_kind: None,
            deadline: item.deadline,
            deadline_type: item.deadline.map(|_| item.deadline_type),
            segment: None,
        });

        if self.config.emit_wait_entries && wait > Duration::zero() {
            allocation.scheduled.push(ScheduledItem {
                id: stable_id(&format!("wait:{}:{}", item.id, slot.end.timestamp())),
                source_id: item.id.clone(),
                name: format!("Waiting on {}", item.name),
                kind: ScheduledKind::AsyncWait,
                workflow_id: item.workflow_id().map(str::to_string),
                priority: None,
                breakdown: None,
                start_time: slot.end,
                end_time: slot.end + wait,
                date,
                block_id: None,
                lane: None,
                is_wait_time: true,
                is_blocked: false,
                meeting_kind: None,
                deadline: None,
                deadline_type: None,
                segment: None,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SchedulingContext;
    use crate::schedule::{BlockType, DailyWorkPattern, MeetingKind, WorkBlock, WorkMeeting};
    use crate::scoring::ScoringConfig;
    use crate::task::{Task, TaskStatus};
    use chrono::TimeZone;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn utc(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).unwrap()
    }

    fn focus_day(date: NaiveDate, id: &str) -> DailyWorkPattern {
        DailyWorkPattern::new(date).with_block(WorkBlock::new(id, "09:00", "13:00", BlockType::Focused))
    }

    fn run(context: &SchedulingContext) -> Allocation {
        let index = WorkIndex::build(context);
        let calendar = Calendar::build(context);
        let engine = PriorityEngine::new(ScoringConfig::default(), context);
        BlockAllocator::default().allocate(&engine, &index, &calendar)
    }

    #[test]
    fn second_long_task_spills_to_next_day() {
        let context = SchedulingContext::new(utc(2, 8, 0))
            .with_pattern(focus_day(monday(), "mon"))
            .with_pattern(focus_day(monday() + Duration::days(1), "tue"))
            .with_task(Task::new("a", "A", 150))
            .with_task(Task::new("b", "B", 150));
        let allocation = run(&context);

        let work: Vec<_> = allocation.scheduled.iter().filter(|s| s.is_work()).collect();
        assert_eq!(work.len(), 2);
        assert_eq!(work[0].block_id.as_deref(), Some("mon"));
        assert_eq!(work[1].block_id.as_deref(), Some("tue"));
        assert_eq!(allocation.block_usage[0].focus, 150);
        assert_eq!(allocation.block_usage[1].focus, 150);
    }

    #[test]
    fn usage_is_tracked_per_day_when_block_ids_repeat() {
        let context = SchedulingContext::new(utc(2, 8, 0))
            .with_pattern(focus_day(monday(), "am"))
            .with_pattern(focus_day(monday() + Duration::days(1), "am"))
            .with_task(Task::new("a", "A", 60));
        let allocation = run(&context);

        assert_eq!(allocation.block_usage.len(), 2);
        assert_eq!(allocation.block_usage[0].focus, 60);
        assert_eq!(allocation.block_usage[1].focus, 0);
    }

    #[test]
    fn meetings_are_carved_out() {
        let context = SchedulingContext::new(utc(2, 8, 0))
            .with_pattern(focus_day(monday(), "mon").with_meeting(WorkMeeting::new(
                "sync",
                "Sync",
                "09:00",
                "10:00",
                MeetingKind::Meeting,
            )))
            .with_task(Task::new("a", "A", 60));
        let allocation = run(&context);

        let placed = allocation.scheduled.iter().find(|s| s.is_work()).unwrap();
        assert_eq!(placed.start_time, utc(2, 10, 0));
        let meeting = allocation.scheduled.iter().find(|s| s.is_blocked).unwrap();
        assert_eq!(meeting.source_id, "sync");
    }

    #[test]
    fn dependents_start_after_dependency_and_wait() {
        let context = SchedulingContext::new(utc(2, 8, 0))
            .with_pattern(focus_day(monday(), "mon"))
            .with_task(Task::new("send", "Send", 30).with_async_wait(60))
            .with_task(Task::new("apply", "Apply", 30).depends_on("send").with_scores(10, 10));
        let allocation = run(&context);

        let send = allocation.scheduled.iter().find(|s| s.source_id == "send" && s.is_work()).unwrap();
        let apply = allocation.scheduled.iter().find(|s| s.source_id == "apply").unwrap();
        assert_eq!(send.end_time, utc(2, 9, 30));
        assert_eq!(apply.start_time, utc(2, 10, 30));
        assert!(allocation.scheduled.iter().any(|s| s.is_wait_time && s.source_id == "send"));
    }

    #[test]
    fn unplaceable_dependency_blocks_dependent() {
        let context = SchedulingContext::new(utc(2, 8, 0))
            .with_pattern(focus_day(monday(), "mon"))
            .with_task(Task::new("b", "B", 600))
            .with_task(Task::new("a", "A", 30).depends_on("b"));
        let allocation = run(&context);

        assert!(allocation.scheduled.iter().all(|s| !s.is_work()));
        let a = allocation.unscheduled.iter().find(|u| u.item_id == "a").unwrap();
        assert_eq!(a.reason, UnscheduledReason::DependencyConflict);
        assert_eq!(a.blocking_dependencies, vec!["b"]);
        let b = allocation.unscheduled.iter().find(|u| u.item_id == "b").unwrap();
        assert_eq!(b.reason, UnscheduledReason::CapacityExceeded);
    }

    #[test]
    fn completed_dependencies_do_not_block() {
        let context = SchedulingContext::new(utc(2, 8, 0))
            .with_pattern(focus_day(monday(), "mon"))
            .with_task(Task::new("b", "B", 60).with_status(TaskStatus::Completed))
            .with_task(Task::new("a", "A", 30).depends_on("b"));
        let allocation = run(&context);
        assert!(allocation.scheduled.iter().any(|s| s.source_id == "a"));
        assert!(allocation.scheduled.iter().all(|s| s.source_id != "b"));
    }

    #[test]
    fn hard_deadline_before_slot_is_unreachable() {
        let context = SchedulingContext::new(utc(2, 8, 0))
            .with_pattern(focus_day(monday(), "mon"))
            .with_task(Task::new("a", "A", 60).with_deadline(utc(2, 9, 30), DeadlineKind::Hard));
        let allocation = run(&context);
        assert_eq!(allocation.unscheduled[0].reason, UnscheduledReason::DeadlineUnreachable);
    }

    #[test]
    fn zero_length_item_released_after_hard_deadline_is_unreachable() {
        let context = SchedulingContext::new(utc(2, 8, 0))
            .with_pattern(focus_day(monday(), "mon"))
            .with_task(Task::new("send", "Send", 30).with_async_wait(120))
            .with_task(
                Task::new("ack", "Ack", 0)
                    .depends_on("send")
                    .with_deadline(utc(2, 10, 0), DeadlineKind::Hard),
            );
        let allocation = run(&context);

        let ack = allocation.unscheduled.iter().find(|u| u.item_id == "ack").unwrap();
        assert_eq!(ack.reason, UnscheduledReason::DeadlineUnreachable);
        assert!(allocation.scheduled.iter().all(|s| s.source_id != "ack"));
    }

    #[test]
    fn cognitive_match_is_taken_at_the_placed_slot() {
        let context = SchedulingContext::new(utc(2, 9, 0))
            .with_pattern(DailyWorkPattern::new(monday()).with_block(WorkBlock::new(
                "pm",
                "14:00",
                "16:00",
                BlockType::Focused,
            )))
            .with_task(Task::new("a", "A", 60).with_complexity(5));
        let allocation = run(&context);

        let placed = allocation.scheduled.iter().find(|s| s.is_work()).unwrap();
        assert_eq!(placed.start_time, utc(2, 14, 0));
        let breakdown = placed.breakdown.as_ref().unwrap();
        assert_eq!(breakdown.productivity_level, crate::scoring::ProductivityLevel::Moderate);
        assert_eq!(breakdown.cognitive_match, 0.7);
    }

    #[test]
    fn day_ceiling_limits_lane_usage() {
        let context = SchedulingContext::new(utc(2, 8, 0))
            .with_pattern(DailyWorkPattern::new(monday()).with_block(
                WorkBlock::new("long", "08:00", "16:00", BlockType::Focused),
            ))
            .with_task(Task::new("a", "A", 180))
            .with_task(Task::new("b", "B", 120));
        let allocation = run(&context);
        assert_eq!(allocation.day_usage[&monday()].focus, 180);
        assert_eq!(allocation.unscheduled.len(), 1);
    }
}

//! Concrete timeline for a run.
//!
//! Turns the day patterns into absolute block windows and immovable busy
//! intervals. Meetings come from three places: the pattern itself, recurring
//! meetings declared on an earlier pattern, and the blocked-time templates
//! in the work settings. A meeting that crosses midnight is split at the day
//! boundary into two segments that share the source meeting id.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::stable_id;
use crate::context::{IntegrityNote, SchedulingContext};
use crate::schedule::{
    parse_minutes_of_day, BlockCapacity, BlockType, CapacityCeilings, DailyWorkPattern, MeetingKind,
    WorkMeeting, WorkSettings, MINUTES_PER_DAY,
};
use crate::task::TaskType;

/// A work block pinned to absolute instants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarBlock {
    pub id: String,
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub block_type: BlockType,
    pub capacity: BlockCapacity,
    /// Capacity was given explicitly rather than derived
    pub declared: bool,
}

impl CalendarBlock {
    pub fn lane_capacity(&self, lane: TaskType) -> u32 {
        match lane {
            TaskType::Focused => self.capacity.focus_minutes,
            TaskType::Admin => self.capacity.admin_minutes,
        }
    }

    pub fn length_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Time nothing else may use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub id: String,
    /// Meeting (or template) this came from
    pub source_id: String,
    pub name: String,
    pub kind: MeetingKind,
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub segment: Option<u8>,
}

/// A declared capacity above the daily ceiling for a lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CeilingExcess {
    pub date: NaiveDate,
    pub lane: TaskType,
    pub declared_minutes: u32,
    pub ceiling_minutes: u32,
}

/// Half-open `[start, end)` interval.
pub type Interval = (DateTime<Utc>, DateTime<Utc>);

#[derive(Debug, Clone)]
pub struct Calendar {
    blocks: Vec<CalendarBlock>,
    busy: Vec<BusyInterval>,
    dates: Vec<NaiveDate>,
    ceilings: CapacityCeilings,
    excesses: Vec<CeilingExcess>,
    notes: Vec<IntegrityNote>,
}

impl Calendar {
    pub fn build(context: &SchedulingContext) -> Self {
        let settings = &context.work_settings;
        let mut notes = Vec::new();

        let mut patterns: Vec<&DailyWorkPattern> = Vec::new();
        let mut seen = BTreeSet::new();
        let mut sorted: Vec<&DailyWorkPattern> = context.work_patterns.iter().collect();
        sorted.sort_by_key(|p| p.date);
        for pattern in sorted {
            if seen.insert(pattern.date) {
                patterns.push(pattern);
            } else {
                notes.push(IntegrityNote {
                    item_id: None,
                    message: format!("second pattern for {} ignored", pattern.date),
                });
            }
        }

        let mut blocks = Vec::new();
        let mut busy = Vec::new();
        let mut declared: BTreeMap<(NaiveDate, TaskType), u32> = BTreeMap::new();

        for (position, pattern) in patterns.iter().enumerate() {
            for block in &pattern.blocks {
                let Some(length) = block.length_minutes() else {
                    notes.push(IntegrityNote {
                        item_id: Some(block.id.clone()),
                        message: format!("block '{}' on {} has an unreadable time range", block.id, pattern.date),
                    });
                    continue;
                };
                let Some(start) = settings.instant(pattern.date, &block.start_time) else {
                    continue;
                };
                if length == 0 {
                    continue;
                }
                let capacity = block.effective_capacity();
                if block.capacity.is_some() {
                    *declared.entry((pattern.date, TaskType::Focused)).or_default() += capacity.focus_minutes;
                    *declared.entry((pattern.date, TaskType::Admin)).or_default() += capacity.admin_minutes;
                }
                blocks.push(CalendarBlock {
                    id: block.id.clone(),
                    date: pattern.date,
                    start,
                    end: start + Duration::minutes(i64::from(length)),
                    block_type: block.block_type,
                    capacity,
                    declared: block.capacity.is_some(),
                });
            }

            for meeting in meetings_for(&patterns, position, settings) {
                match materialize(&meeting, pattern.date, settings) {
                    Some(segments) => busy.extend(segments),
                    None => notes.push(IntegrityNote {
                        item_id: Some(meeting.id.clone()),
                        message: format!(
                            "meeting '{}' on {} has an unreadable time range",
                            meeting.id, pattern.date
                        ),
                    }),
                }
            }
        }

        blocks.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        busy.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

        let ceilings = settings.default_capacity;
        let excesses = declared
            .into_iter()
            .filter_map(|((date, lane), declared_minutes)| {
                let ceiling_minutes = lane_ceiling(&ceilings, lane);
                (declared_minutes > ceiling_minutes).then_some(CeilingExcess {
                    date,
                    lane,
                    declared_minutes,
                    ceiling_minutes,
                })
            })
            .collect();

        Self {
            blocks,
            busy,
            dates: patterns.iter().map(|p| p.date).collect(),
            ceilings,
            excesses,
            notes,
        }
    }

    /// Blocks ordered by start.
    pub fn blocks(&self) -> &[CalendarBlock] {
        &self.blocks
    }

    /// Busy intervals ordered by start.
    pub fn busy(&self) -> &[BusyInterval] {
        &self.busy
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn ceiling_minutes(&self, lane: TaskType) -> u32 {
        lane_ceiling(&self.ceilings, lane)
    }

    pub fn excesses(&self) -> &[CeilingExcess] {
        &self.excesses
    }

    pub fn notes(&self) -> &[IntegrityNote] {
        &self.notes
    }

    pub fn busy_intervals(&self) -> impl Iterator<Item = Interval> + '_ {
        self.busy.iter().map(|b| (b.start, b.end))
    }

    /// Lane minutes available between two instants.
    ///
    /// Blocks only partly inside the window contribute in proportion to the
    /// overlap. Each day is capped at the lane ceiling.
    pub fn lane_capacity_between(&self, lane: TaskType, from: DateTime<Utc>, to: DateTime<Utc>) -> u32 {
        if to <= from {
            return 0;
        }
        let mut per_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for block in &self.blocks {
            let overlap_start = block.start.max(from);
            let overlap_end = block.end.min(to);
            if overlap_end <= overlap_start {
                continue;
            }
            let length = block.length_minutes();
            if length <= 0 {
                continue;
            }
            let overlap = (overlap_end - overlap_start).num_minutes() as f64;
            let share = f64::from(block.lane_capacity(lane)) * overlap / length as f64;
            *per_day.entry(block.date).or_default() += share;
        }
        let ceiling = f64::from(self.ceiling_minutes(lane));
        per_day
            .values()
            .map(|minutes| minutes.min(ceiling).floor() as u32)
            .sum()
    }
}

fn lane_ceiling(ceilings: &CapacityCeilings, lane: TaskType) -> u32 {
    match lane {
        TaskType::Focused => ceilings.focus_minutes(),
        TaskType::Admin => ceilings.admin_minutes(),
    }
}

/// Meetings in effect on `patterns[position]`: its own, recurring ones from
/// earlier patterns it does not redeclare, and matching templates.
fn meetings_for(patterns: &[&DailyWorkPattern], position: usize, settings: &WorkSettings) -> Vec<WorkMeeting> {
    let pattern = patterns[position];
    let mut meetings: Vec<WorkMeeting> = pattern.meetings.clone();
    let mut ids: BTreeSet<String> = meetings.iter().map(|m| m.id.clone()).collect();

    for earlier in &patterns[..position] {
        for meeting in &earlier.meetings {
            let Some(recurrence) = &meeting.recurrence else { continue };
            if recurrence.applies_to(pattern.date) && ids.insert(meeting.id.clone()) {
                meetings.push(meeting.clone());
            }
        }
    }

    for template in settings.blocked_times.iter().filter(|t| t.applies_to(pattern.date)) {
        let meeting = template.to_meeting(pattern.date);
        if ids.insert(meeting.id.clone()) {
            meetings.push(meeting);
        }
    }
    meetings
}

/// Absolute intervals for a meeting on `date`, split at midnight if needed.
fn materialize(meeting: &WorkMeeting, date: NaiveDate, settings: &WorkSettings) -> Option<Vec<BusyInterval>> {
    let start_minute = parse_minutes_of_day(&meeting.start_time)?;
    let end_minute = parse_minutes_of_day(&meeting.end_time)?;
    let start = settings.instant_at_minute(date, start_minute)?;

    let interval = |segment: Option<u8>, day: NaiveDate, from: DateTime<Utc>, to: DateTime<Utc>| BusyInterval {
        id: stable_id(&format!("meeting:{}:{}:{}", meeting.id, date, segment.unwrap_or(0))),
        source_id: meeting.id.clone(),
        name: meeting.name.clone(),
        kind: meeting.kind,
        date: day,
        start: from,
        end: to,
        segment,
    };

    if !meeting.crosses_midnight() {
        let end = settings.instant_at_minute(date, end_minute)?;
        return Some(vec![interval(None, date, start, end)]);
    }

    let midnight = settings.instant_at_minute(date, MINUTES_PER_DAY)?;
    let next_day = date.succ_opt()?;
    let end = settings.instant_at_minute(next_day, end_minute)?;
    if end == midnight {
        return Some(vec![interval(None, date, start, midnight)]);
    }
    Some(vec![
        interval(Some(0), date, start, midnight),
        interval(Some(1), next_day, midnight, end),
    ])
}

/// Free gaps inside `[from, to)` that avoid every occupied interval.
///
/// `occupied` may be unsorted and overlapping.
pub fn free_gaps(from: DateTime<Utc>, to: DateTime<Utc>, occupied: &[Interval]) -> Vec<Interval> {
    let mut gaps = Vec::new();
    if to <= from {
        return gaps;
    }

    let mut sorted: Vec<Interval> = occupied
        .iter()
        .copied()
        .filter(|(start, end)| *end > from && *start < to)
        .collect();
    sorted.sort();

    let mut last_end = from;
    for (start, end) in sorted {
        if end <= last_end {
            continue;
        }
        if start > last_end {
            gaps.push((last_end, start));
        }
        last_end = end;
    }
    if last_end < to {
        gaps.push((last_end, to));
    }
    gaps
}

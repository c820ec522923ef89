//! Capacity calendar inputs: daily work patterns, meetings and work settings.
//!
//! Wall-clock times are `HH:MM` strings interpreted in the fixed UTC offset
//! configured in [`WorkSettings`]. An end time at or before its start time
//! means the interval runs past midnight into the next day.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Parse `HH:MM` into minutes after midnight. `24:00` is accepted as the end
/// of the day.
pub fn parse_minutes_of_day(value: &str) -> Option<u32> {
    let (hour, minute) = value.trim().split_once(':')?;
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    if minute >= 60 {
        return None;
    }
    let total = hour * 60 + minute;
    (total <= MINUTES_PER_DAY).then_some(total)
}

/// What a work block is meant for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Focused,
    Admin,
    Mixed,
    /// Reserved time; never receives work
    Personal,
}

impl Default for BlockType {
    fn default() -> Self {
        BlockType::Mixed
    }
}

/// Focused/admin minute budgets of a block.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockCapacity {
    pub focus_minutes: u32,
    pub admin_minutes: u32,
}

impl BlockCapacity {
    pub fn total(&self) -> u32 {
        self.focus_minutes + self.admin_minutes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkBlock {
    pub id: String,
    /// HH:MM
    pub start_time: String,
    /// HH:MM
    pub end_time: String,
    #[serde(rename = "type", default)]
    pub block_type: BlockType,
    /// Explicit split; derived from `block_type` and length when absent
    #[serde(default)]
    pub capacity: Option<BlockCapacity>,
}

impl WorkBlock {
    pub fn new(
        id: impl Into<String>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
        block_type: BlockType,
    ) -> Self {
        Self {
            id: id.into(),
            start_time: start_time.into(),
            end_time: end_time.into(),
            block_type,
            capacity: None,
        }
    }

    pub fn with_capacity(mut self, focus_minutes: u32, admin_minutes: u32) -> Self {
        self.capacity = Some(BlockCapacity {
            focus_minutes,
            admin_minutes,
        });
        self
    }

    /// Wall-clock length in minutes, wrapping past midnight.
    pub fn length_minutes(&self) -> Option<u32> {
        let start = parse_minutes_of_day(&self.start_time)?;
        let end = parse_minutes_of_day(&self.end_time)?;
        Some(if end > start {
            end - start
        } else {
            end + MINUTES_PER_DAY - start
        })
    }

    /// Capacity split used by the allocator.
    ///
    /// An explicit split wins. Otherwise the whole length goes to the matching
    /// lane, a mixed block is halved (odd minute to focus) and a personal block
    /// has none.
    pub fn effective_capacity(&self) -> BlockCapacity {
        if let Some(capacity) = self.capacity {
            return capacity;
        }
        let length = self.length_minutes().unwrap_or(0);
        match self.block_type {
            BlockType::Focused => BlockCapacity {
                focus_minutes: length,
                admin_minutes: 0,
            },
            BlockType::Admin => BlockCapacity {
                focus_minutes: 0,
                admin_minutes: length,
            },
            BlockType::Mixed => BlockCapacity {
                focus_minutes: length - length / 2,
                admin_minutes: length / 2,
            },
            BlockType::Personal => BlockCapacity::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MeetingKind {
    Meeting,
    Break,
    Personal,
    Blocked,
}

impl Default for MeetingKind {
    fn default() -> Self {
        MeetingKind::Meeting
    }
}

/// Repeat rule for a meeting declared in one pattern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recurrence {
    /// Every later day of the horizon
    Daily,
    /// Later days whose weekday (0=Mon ... 6=Sun) is listed
    Weekly { days: Vec<u8> },
}

impl Recurrence {
    pub fn applies_to(&self, date: NaiveDate) -> bool {
        match self {
            Recurrence::Daily => true,
            Recurrence::Weekly { days } => {
                days.contains(&(date.weekday().num_days_from_monday() as u8))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkMeeting {
    pub id: String,
    pub name: String,
    /// HH:MM
    pub start_time: String,
    /// HH:MM; at or before `start_time` means it ends the next day
    pub end_time: String,
    #[serde(rename = "type", default)]
    pub kind: MeetingKind,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
}

impl WorkMeeting {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
        kind: MeetingKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            start_time: start_time.into(),
            end_time: end_time.into(),
            kind,
            recurrence: None,
        }
    }

    pub fn recurring(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    pub fn crosses_midnight(&self) -> bool {
        match (
            parse_minutes_of_day(&self.start_time),
            parse_minutes_of_day(&self.end_time),
        ) {
            (Some(start), Some(end)) => end <= start,
            _ => false,
        }
    }
}

/// Capacity and meetings for one calendar date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyWorkPattern {
    pub date: NaiveDate,
    #[serde(default)]
    pub blocks: Vec<WorkBlock>,
    #[serde(default)]
    pub meetings: Vec<WorkMeeting>,
}

impl DailyWorkPattern {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            blocks: Vec::new(),
            meetings: Vec::new(),
        }
    }

    pub fn with_block(mut self, block: WorkBlock) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn with_meeting(mut self, meeting: WorkMeeting) -> Self {
        self.meetings.push(meeting);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkHours {
    pub start_time: String,
    pub end_time: String,
}

impl Default for WorkHours {
    fn default() -> Self {
        Self {
            start_time: "09:00".to_string(),
            end_time: "17:00".to_string(),
        }
    }
}

/// Daily ceilings for each capacity lane.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CapacityCeilings {
    #[serde(default = "default_focus_hours")]
    pub max_focus_hours: f64,
    #[serde(default = "default_admin_hours")]
    pub max_admin_hours: f64,
}

fn default_focus_hours() -> f64 {
    4.0
}

fn default_admin_hours() -> f64 {
    3.0
}

impl Default for CapacityCeilings {
    fn default() -> Self {
        Self {
            max_focus_hours: default_focus_hours(),
            max_admin_hours: default_admin_hours(),
        }
    }
}

impl CapacityCeilings {
    pub fn focus_minutes(&self) -> u32 {
        (self.max_focus_hours.max(0.0) * 60.0).round() as u32
    }

    pub fn admin_minutes(&self) -> u32 {
        (self.max_admin_hours.max(0.0) * 60.0).round() as u32
    }

    pub fn total_hours(&self) -> f64 {
        self.max_focus_hours.max(0.0) + self.max_admin_hours.max(0.0)
    }
}

/// Named blocked interval applied to every matching weekday of the horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedTimeTemplate {
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(rename = "type", default = "default_blocked_kind")]
    pub kind: MeetingKind,
    /// 0=Mon ... 6=Sun; empty means every day
    #[serde(default)]
    pub days: Vec<u8>,
}

fn default_blocked_kind() -> MeetingKind {
    MeetingKind::Blocked
}

impl BlockedTimeTemplate {
    pub fn applies_to(&self, date: NaiveDate) -> bool {
        self.days.is_empty() || self.days.contains(&(date.weekday().num_days_from_monday() as u8))
    }

    /// Materialize as a meeting for `date`.
    pub fn to_meeting(&self, date: NaiveDate) -> WorkMeeting {
        let slug: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        WorkMeeting::new(
            format!("template-{slug}-{date}"),
            self.name.clone(),
            self.start_time.clone(),
            self.end_time.clone(),
            self.kind,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkSettings {
    #[serde(default)]
    pub default_work_hours: WorkHours,
    /// Weekday (0=Mon ... 6=Sun) -> hours
    #[serde(default)]
    pub weekday_overrides: BTreeMap<u8, WorkHours>,
    #[serde(default)]
    pub default_capacity: CapacityCeilings,
    #[serde(default)]
    pub blocked_times: Vec<BlockedTimeTemplate>,
    /// Offset applied to every HH:MM value
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Default for WorkSettings {
    fn default() -> Self {
        Self {
            default_work_hours: WorkHours::default(),
            weekday_overrides: BTreeMap::new(),
            default_capacity: CapacityCeilings::default(),
            blocked_times: Vec::new(),
            utc_offset_minutes: 0,
        }
    }
}

impl WorkSettings {
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Focused plus admin ceiling, in hours.
    pub fn work_hours_per_day(&self) -> f64 {
        self.default_capacity.total_hours()
    }

    pub fn work_hours_for(&self, date: NaiveDate) -> &WorkHours {
        let weekday = date.weekday().num_days_from_monday() as u8;
        self.weekday_overrides
            .get(&weekday)
            .unwrap_or(&self.default_work_hours)
    }

    /// Instant for `HH:MM` on `date` in the configured offset.
    pub fn instant(&self, date: NaiveDate, time: &str) -> Option<DateTime<Utc>> {
        let minutes = parse_minutes_of_day(time)?;
        self.instant_at_minute(date, minutes)
    }

    /// Local midnight at the start of `date`, shifted by `minutes`.
    pub fn instant_at_minute(&self, date: NaiveDate, minutes: u32) -> Option<DateTime<Utc>> {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        let local = self.offset().from_local_datetime(&midnight).single()?;
        Some(local.with_timezone(&Utc) + Duration::minutes(i64::from(minutes)))
    }

    /// Local calendar date of an instant.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset()).date_naive()
    }

    /// Local hour of day of an instant.
    pub fn local_hour(&self, instant: DateTime<Utc>) -> u32 {
        instant.with_timezone(&self.offset()).hour()
    }

    /// Pattern a caller can use to backfill a date that has none: one mixed
    /// block spanning the work hours, split along the daily ceilings.
    pub fn default_pattern(&self, date: NaiveDate) -> DailyWorkPattern {
        let hours = self.work_hours_for(date);
        let block = WorkBlock::new(
            format!("default-{date}"),
            hours.start_time.clone(),
            hours.end_time.clone(),
            BlockType::Mixed,
        );
        let length = block.length_minutes().unwrap_or(0);
        let focus = self.default_capacity.focus_minutes().min(length);
        let admin = self.default_capacity.admin_minutes().min(length - focus);
        DailyWorkPattern::new(date).with_block(block.with_capacity(focus, admin))
    }
}

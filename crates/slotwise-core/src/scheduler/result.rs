//! Output of a scheduling run.
//!
//! Everything here is plain data. Collections are vectors in a fixed order
//! so two runs over the same context serialize byte-for-byte identically.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::{BlockType, MeetingKind};
use crate::scoring::PriorityBreakdown;
use crate::task::{DeadlineKind, TaskType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledKind {
    Task,
    WorkflowStep,
    AsyncWait,
    Meeting,
}

/// One placed entry on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledItem {
    /// Stable per-run id, derived from the source and its placement
    pub id: String,
    /// Task, step or meeting this entry was produced from
    pub source_id: String,
    pub name: String,
    pub kind: ScheduledKind,
    pub workflow_id: Option<String>,
    pub priority: Option<f64>,
    pub breakdown: Option<PriorityBreakdown>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub date: NaiveDate,
    pub block_id: Option<String>,
    pub lane: Option<TaskType>,
    pub is_wait_time: bool,
    pub is_blocked: bool,
    pub meeting_kind: Option<MeetingKind>,
    pub deadline: Option<DateTime<Utc>>,
    pub deadline_type: Option<DeadlineKind>,
    /// 0 or 1 for a meeting split at midnight
    pub segment: Option<u8>,
}

impl ScheduledItem {
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// Real work placed into a block, as opposed to waits and meetings.
    pub fn is_work(&self) -> bool {
        matches!(self.kind, ScheduledKind::Task | ScheduledKind::WorkflowStep)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnscheduledReason {
    CapacityExceeded,
    DependencyConflict,
    DeadlineUnreachable,
}

impl std::fmt::Display for UnscheduledReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::CapacityExceeded => "capacity_exceeded",
            Self::DependencyConflict => "dependency_conflict",
            Self::DeadlineUnreachable => "deadline_unreachable",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnscheduledItem {
    pub item_id: String,
    pub name: String,
    pub reason: UnscheduledReason,
    pub priority: f64,
    pub breakdown: PriorityBreakdown,
    /// Dependencies that were neither completed nor placed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocking_dependencies: Vec<String>,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningType {
    SoftDeadlineRisk,
    CapacityWarning,
    CognitiveMismatch,
    DataIntegrity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingWarning {
    #[serde(rename = "type")]
    pub warning_type: WarningType,
    pub message: String,
    pub item_id: Option<String>,
    pub date: Option<NaiveDate>,
}

impl SchedulingWarning {
    pub fn new(warning_type: WarningType, message: impl Into<String>) -> Self {
        Self {
            warning_type,
            message: message.into(),
            item_id: None,
            date: None,
        }
    }

    pub fn for_item(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    ImpossibleDeadline,
    CapacityExceeded,
    DependencyConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Hard,
    Soft,
}

/// Low-priority item that could be dropped to free time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferCandidate {
    pub item_id: String,
    pub name: String,
    pub eisenhower: f64,
    pub remaining_minutes: u32,
}

/// Missing hours per lane before a deadline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapacityShortfall {
    pub focus_hours: f64,
    pub admin_hours: f64,
}

impl CapacityShortfall {
    pub fn is_empty(&self) -> bool {
        self.focus_hours <= 0.0 && self.admin_hours <= 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Remediation {
    pub defer_candidates: Vec<DeferCandidate>,
    /// Hours the deadline must move for the remaining work to fit at all
    pub minimum_extension_hours: u32,
    /// Hours the deadline must move to fit at the configured daily work hours
    pub capacity_extension_hours: u32,
    pub shortfall: CapacityShortfall,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocking_dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingFailure {
    #[serde(rename = "type")]
    pub failure_type: FailureType,
    pub severity: Severity,
    pub item_id: String,
    pub message: String,
    pub remediation: Remediation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionType {
    AsyncOptimization,
    CognitiveLoad,
    ContextSwitch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingSuggestion {
    #[serde(rename = "type")]
    pub suggestion_type: SuggestionType,
    pub message: String,
    pub item_id: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilizationClass {
    FullyUtilized,
    PartiallyUtilized,
    NotUtilized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockUtilization {
    pub block_id: String,
    pub date: NaiveDate,
    pub block_type: BlockType,
    pub focus_used: u32,
    pub focus_capacity: u32,
    pub admin_used: u32,
    pub admin_capacity: u32,
    pub used_minutes: u32,
    pub capacity_minutes: u32,
    /// 0-100
    pub percentage: f64,
    pub classification: UtilizationClass,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub total_items: usize,
    pub scheduled_items: usize,
    pub unscheduled_items: usize,
    pub scheduled_minutes: u32,
    pub failures: usize,
    pub warnings: usize,
    pub horizon_start: Option<NaiveDate>,
    pub horizon_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingResult {
    pub generated_at: DateTime<Utc>,
    pub scheduled: Vec<ScheduledItem>,
    pub unscheduled: Vec<UnscheduledItem>,
    pub warnings: Vec<SchedulingWarning>,
    pub failures: Vec<SchedulingFailure>,
    pub suggestions: Vec<SchedulingSuggestion>,
    pub utilization: Vec<BlockUtilization>,
    pub summary: ScheduleSummary,
    /// SHA-256 of the result serialized with this field empty
    pub fingerprint: String,
}

impl SchedulingResult {
    /// Placed work entry for a task or step.
    pub fn scheduled_work(&self, source_id: &str) -> Option<&ScheduledItem> {
        self.scheduled
            .iter()
            .find(|s| s.is_work() && s.source_id == source_id)
    }

    pub fn unscheduled_item(&self, item_id: &str) -> Option<&UnscheduledItem> {
        self.unscheduled.iter().find(|u| u.item_id == item_id)
    }

    pub fn failures_for<'a>(&'a self, item_id: &'a str) -> impl Iterator<Item = &'a SchedulingFailure> + 'a {
        self.failures.iter().filter(move |f| f.item_id == item_id)
    }

    pub fn warnings_of(&self, warning_type: WarningType) -> impl Iterator<Item = &SchedulingWarning> {
        self.warnings
            .iter()
            .filter(move |w| w.warning_type == warning_type)
    }

    pub fn has_hard_failures(&self) -> bool {
        self.failures.iter().any(|f| f.severity == Severity::Hard)
    }
}

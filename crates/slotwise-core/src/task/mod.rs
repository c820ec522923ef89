//! Work item types: standalone tasks and the normalized [`WorkItem`] view.
//!
//! Callers hand in [`Task`]s and [`crate::workflow::WorkflowStep`]s. Before a
//! run both are flattened into [`WorkItem`]s so scoring, feasibility and
//! allocation operate on a single shape. Inheritance from the parent workflow
//! (deadline, importance, urgency) is resolved during that flattening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::{Workflow, WorkflowStep};

pub const MIN_IMPORTANCE: u8 = 1;
pub const MAX_IMPORTANCE: u8 = 10;
pub const MIN_COMPLEXITY: u8 = 1;
pub const MAX_COMPLEXITY: u8 = 5;

/// Capacity lane an item consumes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Deep work, drawn from the focused-minutes budget
    Focused,
    /// Shallow work, drawn from the admin-minutes budget
    Admin,
}

impl Default for TaskType {
    fn default() -> Self {
        TaskType::Focused
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::Focused => write!(f, "focused"),
            TaskType::Admin => write!(f, "admin"),
        }
    }
}

/// Completion status of a task or workflow step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    /// Started, now blocked on an external async wait
    Waiting,
    Completed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::NotStarted
    }
}

/// Whether missing a deadline is a failure or a risk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeadlineKind {
    Hard,
    Soft,
}

impl Default for DeadlineKind {
    fn default() -> Self {
        DeadlineKind::Hard
    }
}

fn default_level() -> u8 {
    5
}

fn default_complexity() -> u8 {
    3
}

/// A standalone task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    /// Estimated duration in minutes
    pub duration: u32,
    /// 1-10
    #[serde(default = "default_level")]
    pub importance: u8,
    /// 1-10
    #[serde(default = "default_level")]
    pub urgency: u8,
    /// 1-5
    #[serde(default = "default_complexity")]
    pub cognitive_complexity: u8,
    #[serde(default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deadline_type: DeadlineKind,
    /// Minutes of external waiting triggered once this task ends
    #[serde(default)]
    pub async_wait_time: u32,
    #[serde(default)]
    pub is_async_trigger: bool,
    /// Ids (or, in legacy data, names) of tasks this one waits for
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Grouping used for context-switch detection
    #[serde(default)]
    pub project_id: Option<String>,
}

impl Task {
    /// Minimal task with neutral scores, used heavily by tests and the CLI.
    pub fn new(id: impl Into<String>, name: impl Into<String>, duration: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            duration,
            importance: default_level(),
            urgency: default_level(),
            cognitive_complexity: default_complexity(),
            task_type: TaskType::default(),
            status: TaskStatus::default(),
            deadline: None,
            deadline_type: DeadlineKind::default(),
            async_wait_time: 0,
            is_async_trigger: false,
            dependencies: Vec::new(),
            project_id: None,
        }
    }

    pub fn with_scores(mut self, importance: u8, urgency: u8) -> Self {
        self.importance = importance;
        self.urgency = urgency;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>, kind: DeadlineKind) -> Self {
        self.deadline = Some(deadline);
        self.deadline_type = kind;
        self
    }

    pub fn with_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn with_complexity(mut self, complexity: u8) -> Self {
        self.cognitive_complexity = complexity;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_async_wait(mut self, minutes: u32) -> Self {
        self.async_wait_time = minutes;
        self.is_async_trigger = minutes > 0;
        self
    }

    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn in_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// Where a [`WorkItem`] came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkItemSource {
    Task,
    WorkflowStep {
        workflow_id: String,
        step_index: usize,
    },
}

/// Flattened, run-local view of a task or workflow step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub name: String,
    pub duration: u32,
    pub importance: u8,
    pub urgency: u8,
    pub cognitive_complexity: u8,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub deadline: Option<DateTime<Utc>>,
    pub deadline_type: DeadlineKind,
    /// True when `deadline` was taken from the parent workflow
    pub deadline_inherited: bool,
    pub async_wait_time: u32,
    pub is_async_trigger: bool,
    pub dependencies: Vec<String>,
    pub source: WorkItemSource,
    /// Workflow id for steps, project id for tasks
    pub context_key: Option<String>,
}

impl WorkItem {
    pub fn from_task(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            name: task.name.clone(),
            duration: task.duration,
            importance: task.importance,
            urgency: task.urgency,
            cognitive_complexity: task.cognitive_complexity,
            task_type: task.task_type,
            status: task.status,
            deadline: task.deadline,
            deadline_type: task.deadline_type,
            deadline_inherited: false,
            async_wait_time: task.async_wait_time,
            is_async_trigger: task.is_async_trigger,
            dependencies: task.dependencies.clone(),
            source: WorkItemSource::Task,
            context_key: task.project_id.clone(),
        }
    }

    pub fn from_step(workflow: &Workflow, step_index: usize, step: &WorkflowStep) -> Self {
        let (deadline, deadline_type, deadline_inherited) = match step.deadline {
            Some(own) => (Some(own), step.deadline_type.unwrap_or(workflow.deadline_type), false),
            None => (workflow.deadline, workflow.deadline_type, workflow.deadline.is_some()),
        };

        Self {
            id: step.id.clone(),
            name: step.name.clone(),
            duration: step.duration,
            importance: step.importance.unwrap_or(workflow.importance),
            urgency: step.urgency.unwrap_or(workflow.urgency),
            cognitive_complexity: step.cognitive_complexity,
            task_type: step.task_type,
            status: step.status,
            deadline,
            deadline_type,
            deadline_inherited,
            async_wait_time: step.async_wait_time,
            is_async_trigger: step.is_async_trigger,
            dependencies: step.dependencies.clone(),
            source: WorkItemSource::WorkflowStep {
                workflow_id: workflow.id.clone(),
                step_index,
            },
            context_key: Some(workflow.id.clone()),
        }
    }

    /// Clamp scores into their documented ranges.
    ///
    /// Returns the names of the fields that had to be adjusted so the caller
    /// can surface them as data-integrity warnings.
    pub fn clamp_ranges(&mut self) -> Vec<&'static str> {
        let mut clamped = Vec::new();
        let importance = self.importance.clamp(MIN_IMPORTANCE, MAX_IMPORTANCE);
        if importance != self.importance {
            self.importance = importance;
            clamped.push("importance");
        }
        let urgency = self.urgency.clamp(MIN_IMPORTANCE, MAX_IMPORTANCE);
        if urgency != self.urgency {
            self.urgency = urgency;
            clamped.push("urgency");
        }
        let complexity = self.cognitive_complexity.clamp(MIN_COMPLEXITY, MAX_COMPLEXITY);
        if complexity != self.cognitive_complexity {
            self.cognitive_complexity = complexity;
            clamped.push("cognitive_complexity");
        }
        clamped
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Minutes still to be worked; zero once completed.
    pub fn remaining_minutes(&self) -> u32 {
        if self.is_completed() {
            0
        } else {
            self.duration
        }
    }

    /// Eisenhower score: `importance × urgency`.
    pub fn eisenhower(&self) -> f64 {
        f64::from(self.importance) * f64::from(self.urgency)
    }

    /// Whether finishing this item starts external asynchronous work.
    pub fn triggers_async(&self) -> bool {
        self.is_async_trigger || (self.async_wait_time > 0 && self.duration > 0)
    }

    pub fn workflow_id(&self) -> Option<&str> {
        match &self.source {
            WorkItemSource::WorkflowStep { workflow_id, .. } => Some(workflow_id),
            WorkItemSource::Task => None,
        }
    }

    pub fn is_workflow_step(&self) -> bool {
        matches!(self.source, WorkItemSource::WorkflowStep { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_defaults_fill_missing_fields() {
        let json = r#"{"id":"t1","name":"Write report","duration":90}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.importance, 5);
        assert_eq!(task.urgency, 5);
        assert_eq!(task.cognitive_complexity, 3);
        assert_eq!(task.task_type, TaskType::Focused);
        assert_eq!(task.status, TaskStatus::NotStarted);
        assert_eq!(task.deadline_type, DeadlineKind::Hard);
        assert!(task.dependencies.is_empty());
    }

    #[test]
    fn status_uses_snake_case() {
        let status: TaskStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(status, TaskStatus::InProgress);
    }

    #[test]
    fn clamp_ranges_reports_adjusted_fields() {
        let mut item = WorkItem::from_task(&Task::new("t", "T", 30).with_scores(0, 14).with_complexity(9));
        let clamped = item.clamp_ranges();
        assert_eq!(clamped, vec!["importance", "urgency", "cognitive_complexity"]);
        assert_eq!(item.importance, 1);
        assert_eq!(item.urgency, 10);
        assert_eq!(item.cognitive_complexity, 5);
    }

    #[test]
    fn async_trigger_requires_duration_when_flag_unset() {
        let mut task = Task::new("t", "T", 0);
        task.async_wait_time = 60;
        assert!(!WorkItem::from_task(&task).triggers_async());

        task.duration = 15;
        assert!(WorkItem::from_task(&task).triggers_async());
    }

    #[test]
    fn completed_items_have_no_remaining_work() {
        let item = WorkItem::from_task(&Task::new("t", "T", 45).with_status(TaskStatus::Completed));
        assert_eq!(item.remaining_minutes(), 0);
        assert_eq!(item.eisenhower(), 25.0);
    }
}

//! Multi-step workflows.
//!
//! A workflow is an ordered list of steps joined by dependency edges. Its
//! overall status is always derived from the step statuses and never stored.

pub mod dependency;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::task::{DeadlineKind, TaskStatus, TaskType};

pub use dependency::{DependencyGraph, DependencyIssue, GraphNode};

fn default_level() -> u8 {
    5
}

fn default_complexity() -> u8 {
    3
}

/// One step of a workflow.
///
/// `importance`, `urgency`, `deadline` and `deadline_type` fall back to the
/// parent workflow when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    pub name: String,
    /// Minutes
    pub duration: u32,
    #[serde(default)]
    pub importance: Option<u8>,
    #[serde(default)]
    pub urgency: Option<u8>,
    #[serde(default = "default_complexity")]
    pub cognitive_complexity: u8,
    #[serde(default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deadline_type: Option<DeadlineKind>,
    #[serde(default)]
    pub async_wait_time: u32,
    #[serde(default)]
    pub is_async_trigger: bool,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl WorkflowStep {
    pub fn new(id: impl Into<String>, name: impl Into<String>, duration: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            duration,
            importance: None,
            urgency: None,
            cognitive_complexity: default_complexity(),
            task_type: TaskType::default(),
            status: TaskStatus::default(),
            deadline: None,
            deadline_type: None,
            async_wait_time: 0,
            is_async_trigger: false,
            dependencies: Vec::new(),
        }
    }

    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn with_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
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

    pub fn with_complexity(mut self, complexity: u8) -> Self {
        self.cognitive_complexity = complexity;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>, kind: DeadlineKind) -> Self {
        self.deadline = Some(deadline);
        self.deadline_type = Some(kind);
        self
    }
}

/// Derived status of a whole workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deadline_type: DeadlineKind,
    #[serde(default = "default_level")]
    pub importance: u8,
    #[serde(default = "default_level")]
    pub urgency: u8,
}

impl Workflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            steps: Vec::new(),
            deadline: None,
            deadline_type: DeadlineKind::default(),
            importance: default_level(),
            urgency: default_level(),
        }
    }

    pub fn with_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>, kind: DeadlineKind) -> Self {
        self.deadline = Some(deadline);
        self.deadline_type = kind;
        self
    }

    pub fn with_scores(mut self, importance: u8, urgency: u8) -> Self {
        self.importance = importance;
        self.urgency = urgency;
        self
    }

    pub fn step(&self, id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Completed iff every step is completed, in progress iff any step has
    /// been started (or some but not all are done), pending otherwise.
    /// A workflow without steps is pending.
    pub fn overall_status(&self) -> WorkflowStatus {
        if self.steps.is_empty() {
            return WorkflowStatus::Pending;
        }
        let completed = self
            .steps
            .iter()
            .filter(|s| s.status == TaskStatus::Completed)
            .count();
        if completed == self.steps.len() {
            return WorkflowStatus::Completed;
        }
        let started = self
            .steps
            .iter()
            .any(|s| matches!(s.status, TaskStatus::InProgress | TaskStatus::Waiting));
        if started || completed > 0 {
            WorkflowStatus::InProgress
        } else {
            WorkflowStatus::Pending
        }
    }

    pub fn is_completed(&self) -> bool {
        self.overall_status() == WorkflowStatus::Completed
    }

    /// Minutes of work left across all unfinished steps.
    pub fn remaining_minutes(&self) -> u32 {
        self.steps
            .iter()
            .filter(|s| s.status != TaskStatus::Completed)
            .map(|s| s.duration)
            .sum()
    }

    pub fn graph_nodes(&self) -> impl Iterator<Item = GraphNode<'_>> {
        self.steps
            .iter()
            .map(|s| GraphNode::new(&s.id, &s.name, &s.dependencies))
    }

    /// Resolve this workflow's step graph.
    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyGraph::build(self.graph_nodes())
    }

    /// Add `step_id depends on dependency_id`, refusing edges that would
    /// close a cycle.
    pub fn add_dependency(&mut self, step_id: &str, dependency_id: &str) -> Result<(), ValidationError> {
        if step_id == dependency_id {
            return Err(ValidationError::SelfDependency(step_id.to_string()));
        }
        for id in [step_id, dependency_id] {
            if self.step(id).is_none() {
                return Err(ValidationError::UnknownStep {
                    workflow: self.id.clone(),
                    step: id.to_string(),
                });
            }
        }
        if self.dependency_graph().would_create_cycle(step_id, dependency_id) {
            return Err(ValidationError::DependencyCycle {
                source_id: step_id.to_string(),
                target_id: dependency_id.to_string(),
            });
        }

        if let Some(step) = self.steps.iter_mut().find(|s| s.id == step_id) {
            if !step.dependencies.iter().any(|d| d == dependency_id) {
                step.dependencies.push(dependency_id.to_string());
            }
        }
        Ok(())
    }
}

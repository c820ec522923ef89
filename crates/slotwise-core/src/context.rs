//! The immutable snapshot handed to every scheduling run, and the run-local
//! index built from it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schedule::{DailyWorkPattern, WorkSettings};
use crate::task::{Task, TaskType, WorkItem, WorkItemSource};
use crate::workflow::{DependencyGraph, GraphNode, Workflow};

/// Everything one run needs. Built fresh by the caller for every recompute
/// and never mutated while a run is in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingContext {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub workflows: Vec<Workflow>,
    #[serde(default)]
    pub work_patterns: Vec<DailyWorkPattern>,
    #[serde(default)]
    pub work_settings: WorkSettings,
    /// Injected "now"; the core never reads the system clock
    pub current_time: DateTime<Utc>,
}

impl SchedulingContext {
    pub fn new(current_time: DateTime<Utc>) -> Self {
        Self {
            tasks: Vec::new(),
            workflows: Vec::new(),
            work_patterns: Vec::new(),
            work_settings: WorkSettings::default(),
            current_time,
        }
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_workflow(mut self, workflow: Workflow) -> Self {
        self.workflows.push(workflow);
        self
    }

    pub fn with_pattern(mut self, pattern: DailyWorkPattern) -> Self {
        self.work_patterns.push(pattern);
        self
    }

    pub fn with_settings(mut self, settings: WorkSettings) -> Self {
        self.work_settings = settings;
        self
    }

    /// Decode a JSON snapshot.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Fill dates without a pattern, from today through `horizon_days` ahead,
    /// using [`WorkSettings::default_pattern`]. This is a caller-side helper;
    /// a run never invents capacity by itself.
    pub fn with_backfilled_patterns(mut self, horizon_days: u32) -> Self {
        let today = self.work_settings.local_date(self.current_time);
        let known: BTreeSet<NaiveDate> = self.work_patterns.iter().map(|p| p.date).collect();
        for offset in 0..=i64::from(horizon_days) {
            let date = today + Duration::days(offset);
            if !known.contains(&date) {
                self.work_patterns.push(self.work_settings.default_pattern(date));
            }
        }
        self.work_patterns.sort_by_key(|p| p.date);
        self
    }

    /// First and last pattern dates.
    pub fn horizon(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.work_patterns.iter().map(|p| p.date).min()?;
        let last = self.work_patterns.iter().map(|p| p.date).max()?;
        Some((first, last))
    }
}

/// Data problem noticed while indexing; surfaced as a warning, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityNote {
    pub item_id: Option<String>,
    pub message: String,
}

/// Run-local lookup structure over a [`SchedulingContext`].
///
/// Flattens tasks and steps into [`WorkItem`]s and resolves every dependency
/// reference exactly once through the [`DependencyGraph`].
#[derive(Debug, Clone)]
pub struct WorkIndex {
    items: Vec<WorkItem>,
    by_id: HashMap<String, usize>,
    graph: DependencyGraph,
    levels: BTreeMap<String, usize>,
    workflow_items: BTreeMap<String, Vec<usize>>,
    notes: Vec<IntegrityNote>,
}

impl WorkIndex {
    pub fn build(context: &SchedulingContext) -> Self {
        let mut items = Vec::new();
        let mut by_id = HashMap::new();
        let mut notes = Vec::new();

        let candidates = context
            .tasks
            .iter()
            .map(WorkItem::from_task)
            .chain(context.workflows.iter().flat_map(|wf| {
                wf.steps
                    .iter()
                    .enumerate()
                    .map(move |(idx, step)| WorkItem::from_step(wf, idx, step))
            }));

        for mut item in candidates {
            if by_id.contains_key(&item.id) {
                notes.push(IntegrityNote {
                    item_id: Some(item.id.clone()),
                    message: format!("duplicate id '{}' ignored", item.id),
                });
                continue;
            }
            for field in item.clamp_ranges() {
                notes.push(IntegrityNote {
                    item_id: Some(item.id.clone()),
                    message: format!("'{}' had {field} out of range; clamped", item.id),
                });
            }
            by_id.insert(item.id.clone(), items.len());
            items.push(item);
        }

        let mut workflow_items: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut task_scope = Vec::new();
        for (idx, item) in items.iter().enumerate() {
            match &item.source {
                WorkItemSource::Task => task_scope.push(idx),
                WorkItemSource::WorkflowStep { workflow_id, .. } => {
                    workflow_items.entry(workflow_id.clone()).or_default().push(idx)
                }
            }
        }

        let node = |idx: &usize| {
            let item = &items[*idx];
            GraphNode::new(&item.id, &item.name, &item.dependencies)
        };
        let mut scopes: Vec<Vec<GraphNode<'_>>> = vec![task_scope.iter().map(node).collect()];
        for wf in &context.workflows {
            if let Some(members) = workflow_items.get(&wf.id) {
                scopes.push(members.iter().map(node).collect());
            }
        }
        let graph = DependencyGraph::build_scoped(scopes);

        notes.extend(
            graph
                .issues()
                .iter()
                .filter(|issue| issue.is_warning())
                .map(|issue| IntegrityNote {
                    item_id: Some(issue.item_id().to_string()),
                    message: issue.describe(),
                }),
        );

        let levels = graph.levels();

        Self {
            items,
            by_id,
            graph,
            levels,
            workflow_items,
            notes,
        }
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn item(&self, id: &str) -> Option<&WorkItem> {
        self.by_id.get(id).map(|&idx| &self.items[idx])
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn notes(&self) -> &[IntegrityNote] {
        &self.notes
    }

    /// Longest chain of dependencies below this item.
    pub fn level(&self, id: &str) -> usize {
        self.levels.get(id).copied().unwrap_or(0)
    }

    /// Resolved direct dependencies.
    pub fn dependencies(&self, item: &WorkItem) -> Vec<&WorkItem> {
        self.resolve(self.graph.dependencies_of(&item.id))
    }

    pub fn transitive_dependencies(&self, item: &WorkItem) -> Vec<&WorkItem> {
        self.resolve(self.graph.transitive_dependencies(&item.id))
    }

    pub fn transitive_dependents(&self, item: &WorkItem) -> Vec<&WorkItem> {
        self.resolve(self.graph.transitive_dependents(&item.id))
    }

    pub fn workflow_items(&self, workflow_id: &str) -> Vec<&WorkItem> {
        self.workflow_items
            .get(workflow_id)
            .map(|members| members.iter().map(|&idx| &self.items[idx]).collect())
            .unwrap_or_default()
    }

    fn resolve<'a>(&'a self, ids: Vec<&str>) -> Vec<&'a WorkItem> {
        ids.into_iter().filter_map(|id| self.item(id)).collect()
    }

    /// Items whose remaining work must finish by this item's deadline.
    ///
    /// For a deadline inherited from the workflow that is the whole
    /// workflow; otherwise the item plus everything it transitively waits on.
    pub fn deadline_chain<'a>(&'a self, item: &'a WorkItem) -> Vec<&'a WorkItem> {
        if item.deadline_inherited {
            if let Some(workflow_id) = item.workflow_id() {
                return self.workflow_items(workflow_id);
            }
        }
        let mut chain = self.transitive_dependencies(item);
        chain.push(item);
        chain
    }

    /// Remaining minutes on the path ending at this item's deadline.
    pub fn critical_path_minutes(&self, item: &WorkItem) -> u32 {
        self.deadline_chain(item)
            .iter()
            .map(|i| i.remaining_minutes())
            .sum()
    }

    /// Remaining minutes per lane across `items`.
    pub fn lane_minutes<'a>(items: impl IntoIterator<Item = &'a WorkItem>) -> (u32, u32) {
        items.into_iter().fold((0, 0), |(focus, admin), item| match item.task_type {
            TaskType::Focused => (focus + item.remaining_minutes(), admin),
            TaskType::Admin => (focus, admin + item.remaining_minutes()),
        })
    }
}

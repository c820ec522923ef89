//! # Slotwise Core Library
//!
//! Deadline-aware scheduling core. Places tasks and multi-step workflows
//! into daily work blocks under per-lane capacity limits, around fixed
//! meetings, in dependency order, and explains every item it could not place.
//!
//! ## Architecture
//!
//! - **Dependency Resolver**: id-or-name resolution, cycle prevention and
//!   topological leveling over workflow steps
//! - **Priority Engine**: Eisenhower score combined with deadline pressure,
//!   async urgency, cognitive matching and a context-switch penalty
//! - **Deadline Feasibility Analyzer**: pre-pass that flags impossible hard
//!   deadlines with remediation
//! - **Block Allocator**: day-by-day capacity bin-packing with meeting
//!   carve-outs and midnight-crossing segments
//! - **Diagnostics Reporter**: utilization, warnings, suggestions and
//!   unscheduled reasons
//!
//! A run is a pure, synchronous function of a [`SchedulingContext`]; the
//! current time is always injected by the caller.
//!
//! ## Key Components
//!
//! - [`Scheduler`]: runs the full pipeline
//! - [`SchedulingContext`]: immutable input snapshot
//! - [`SchedulingResult`]: placements plus diagnostics
//! - [`Config`]: TOML configuration

pub mod context;
pub mod diagnostics;
pub mod error;
pub mod feasibility;
pub mod schedule;
pub mod scheduler;
pub mod scoring;
pub mod storage;
pub mod task;
pub mod workflow;

pub use context::{SchedulingContext, WorkIndex};
pub use diagnostics::DiagnosticsConfig;
pub use error::{ConfigError, CoreError, ValidationError};
pub use feasibility::{FeasibilityAnalyzer, FeasibilityReport};
pub use schedule::{
    BlockType, BlockedTimeTemplate, CapacityCeilings, DailyWorkPattern, MeetingKind, Recurrence, WorkBlock,
    WorkMeeting, WorkSettings,
};
pub use scheduler::{
    schedule, AllocatorConfig, Scheduler, SchedulerConfig, ScheduledItem, SchedulingFailure, SchedulingResult,
    SchedulingSuggestion, SchedulingWarning, UnscheduledItem, UnscheduledReason,
};
pub use scoring::{PriorityBreakdown, PriorityEngine, ScoringConfig};
pub use storage::Config;
pub use task::{DeadlineKind, Task, TaskStatus, TaskType, WorkItem};
pub use workflow::{DependencyGraph, Workflow, WorkflowStatus, WorkflowStep};

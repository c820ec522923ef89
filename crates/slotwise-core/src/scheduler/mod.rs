//! Scheduling pipeline.
//!
//! One run is a pure function of a [`SchedulingContext`]:
//!
//! 1. index work items and resolve dependencies ([`WorkIndex`])
//! 2. lay out blocks and immovable meetings ([`Calendar`])
//! 3. check hard deadlines ([`FeasibilityAnalyzer`])
//! 4. place items ([`BlockAllocator`])
//! 5. explain the outcome ([`DiagnosticsReporter`])

pub mod allocator;
pub mod calendar;
pub mod result;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::{SchedulingContext, WorkIndex};
use crate::diagnostics::{DiagnosticsConfig, DiagnosticsReporter};
use crate::feasibility::{FeasibilityAnalyzer, FeasibilityReport};
use crate::scoring::{PriorityEngine, ScoringConfig};

pub use allocator::{AllocatorConfig, BlockAllocator};
pub use calendar::Calendar;
pub use result::*;

/// Namespace for ids derived from run content.
const ID_NAMESPACE: Uuid = Uuid::from_u128(0x5e1f_0a7c_4d2b_4f3e_9b1a_6c8d_2e4f_7a90);

/// Deterministic id for a piece of run output.
pub(crate) fn stable_id(key: &str) -> String {
    Uuid::new_v5(&ID_NAMESPACE, key.as_bytes()).to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub scoring: ScoringConfig,
    pub allocator: AllocatorConfig,
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline.
    pub fn schedule(&self, context: &SchedulingContext) -> SchedulingResult {
        let index = WorkIndex::build(context);
        let calendar = Calendar::build(context);
        let engine = PriorityEngine::new(self.config.scoring.clone(), context);

        let feasibility = FeasibilityAnalyzer::new(&engine, &index, &calendar)
            .with_max_defer_candidates(self.config.diagnostics.max_defer_candidates)
            .analyze(context);
        let allocation = BlockAllocator::new(self.config.allocator.clone()).allocate(&engine, &index, &calendar);

        let result = DiagnosticsReporter::new(&self.config.diagnostics, &engine, &index, &calendar)
            .report(allocation, feasibility);

        tracing::info!(
            scheduled = result.summary.scheduled_items,
            unscheduled = result.summary.unscheduled_items,
            failures = result.summary.failures,
            warnings = result.summary.warnings,
            "scheduling run complete"
        );
        result
    }

    /// Only the deadline pre-pass.
    pub fn check_deadlines(&self, context: &SchedulingContext) -> FeasibilityReport {
        let index = WorkIndex::build(context);
        let calendar = Calendar::build(context);
        let engine = PriorityEngine::new(self.config.scoring.clone(), context);
        FeasibilityAnalyzer::new(&engine, &index, &calendar)
            .with_max_defer_candidates(self.config.diagnostics.max_defer_candidates)
            .analyze(context)
    }
}

/// Run with default configuration.
pub fn schedule(context: &SchedulingContext) -> SchedulingResult {
    Scheduler::default().schedule(context)
}

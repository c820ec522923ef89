use std::path::PathBuf;

use clap::Subcommand;
use slotwise_core::{SchedulingContext, WorkIndex};

use crate::common::CliResult;

#[derive(Subcommand)]
pub enum DepsAction {
    /// Show dependency levels and resolution issues
    Levels {
        #[arg(long, short = 'c', value_name = "FILE")]
        context: PathBuf,
    },
    /// Check whether a new step dependency would close a cycle
    CheckEdge {
        #[arg(long, short = 'c', value_name = "FILE")]
        context: PathBuf,
        #[arg(long)]
        workflow: String,
        /// Step that would gain the dependency
        step: String,
        /// Step it would depend on
        dependency: String,
    },
}

pub fn run(action: DepsAction) -> CliResult {
    match action {
        DepsAction::Levels { context } => {
            let context = SchedulingContext::from_json_file(&context)?;
            let index = WorkIndex::build(&context);
            let graph = index.graph();

            for id in graph.topological_order() {
                let deps = graph.dependencies_of(id);
                if deps.is_empty() {
                    println!("{} {id}", index.level(id));
                } else {
                    println!("{} {id} <- {}", index.level(id), deps.join(", "));
                }
            }
            for issue in graph.issues() {
                println!("note: {}", issue.describe());
            }
        }
        DepsAction::CheckEdge {
            context,
            workflow,
            step,
            dependency,
        } => {
            let context = SchedulingContext::from_json_file(&context)?;
            let mut target = context
                .workflows
                .into_iter()
                .find(|w| w.id == workflow)
                .ok_or_else(|| format!("no workflow with id '{workflow}'"))?;
            target.add_dependency(&step, &dependency)?;
            println!("ok: {step} may depend on {dependency}");
        }
    }
    Ok(())
}

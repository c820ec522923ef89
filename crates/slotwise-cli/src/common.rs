//! Helpers shared by the subcommands.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::Args;
use slotwise_core::{Config, SchedulingContext};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Where to read a context snapshot from, and how to adjust it.
#[derive(Args, Debug, Clone)]
pub struct ContextArgs {
    /// JSON context snapshot
    #[arg(long, short = 'c', value_name = "FILE")]
    pub context: PathBuf,
    /// Override the snapshot's current_time (RFC 3339)
    #[arg(long)]
    pub now: Option<DateTime<Utc>>,
    /// Fill dates without a pattern from the work settings
    #[arg(long)]
    pub backfill: bool,
}

pub fn load_config(path: Option<&Path>) -> CliResult<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

pub fn config_path(path: Option<&Path>) -> CliResult<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(Config::path()?),
    }
}

pub fn load_context(args: &ContextArgs, config: &Config) -> CliResult<SchedulingContext> {
    let mut context = SchedulingContext::from_json_file(&args.context)
        .map_err(|e| format!("cannot read context {}: {e}", args.context.display()))?;
    if let Some(now) = args.now {
        context.current_time = now;
    }
    if args.backfill {
        context = context.with_backfilled_patterns(config.backfill.horizon_days);
    }
    tracing::debug!(
        tasks = context.tasks.len(),
        workflows = context.workflows.len(),
        patterns = context.work_patterns.len(),
        "context loaded"
    );
    Ok(context)
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

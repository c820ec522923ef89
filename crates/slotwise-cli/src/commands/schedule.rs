use std::path::Path;

use chrono::FixedOffset;
use clap::Subcommand;
use slotwise_core::scheduler::ScheduledKind;
use slotwise_core::{Scheduler, SchedulingResult};

use crate::common::{load_config, load_context, print_json, CliResult, ContextArgs};

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Place every open item and report what did not fit
    Run {
        #[command(flatten)]
        input: ContextArgs,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Explain the placement or rejection of one item
    Explain {
        #[command(flatten)]
        input: ContextArgs,
        /// Task or workflow step id
        id: String,
    },
}

pub fn run(action: ScheduleAction, config_path: Option<&Path>) -> CliResult {
    let config = load_config(config_path)?;
    let scheduler = Scheduler::new(config.scheduler_config());

    match action {
        ScheduleAction::Run { input, json } => {
            let context = load_context(&input, &config)?;
            let result = scheduler.schedule(&context);
            if json {
                print_json(&result)?;
            } else {
                print_result(&result, context.work_settings.offset());
            }
        }
        ScheduleAction::Explain { input, id } => {
            let context = load_context(&input, &config)?;
            let result = scheduler.schedule(&context);
            explain(&result, &id, context.work_settings.offset())?;
        }
    }
    Ok(())
}

fn print_result(result: &SchedulingResult, offset: FixedOffset) {
    let mut current_date = None;
    for entry in &result.scheduled {
        if current_date != Some(entry.date) {
            println!("{}", entry.date);
            current_date = Some(entry.date);
        }
        let marker = match entry.kind {
            ScheduledKind::Task | ScheduledKind::WorkflowStep => " ",
            ScheduledKind::AsyncWait => "~",
            ScheduledKind::Meeting => "#",
        };
        let priority = entry.priority.map(|p| format!(" [{p:.1}]")).unwrap_or_default();
        println!(
            "  {marker} {}-{}  {}{priority}",
            entry.start_time.with_timezone(&offset).format("%H:%M"),
            entry.end_time.with_timezone(&offset).format("%H:%M"),
            entry.name,
        );
    }

    if !result.unscheduled.is_empty() {
        println!("Unscheduled:");
        for item in &result.unscheduled {
            println!("  {} ({}): {}", item.item_id, item.reason, item.detail);
        }
    }
    for failure in &result.failures {
        println!("Failure [{:?}] {}: {}", failure.severity, failure.item_id, failure.message);
    }
    for warning in &result.warnings {
        println!("Warning: {}", warning.message);
    }
    for suggestion in &result.suggestions {
        println!("Suggestion: {}", suggestion.message);
    }
    println!(
        "{} of {} items scheduled, {} minutes booked",
        result.summary.scheduled_items, result.summary.total_items, result.summary.scheduled_minutes
    );
}

fn explain(result: &SchedulingResult, id: &str, offset: FixedOffset) -> CliResult {
    let breakdown = if let Some(entry) = result.scheduled_work(id) {
        println!(
            "{} scheduled {} {}-{} in block {}",
            entry.name,
            entry.date,
            entry.start_time.with_timezone(&offset).format("%H:%M"),
            entry.end_time.with_timezone(&offset).format("%H:%M"),
            entry.block_id.as_deref().unwrap_or("-"),
        );
        entry.breakdown.clone()
    } else if let Some(item) = result.unscheduled_item(id) {
        println!("{} not scheduled: {} ({})", item.name, item.reason, item.detail);
        if !item.blocking_dependencies.is_empty() {
            println!("  blocked by: {}", item.blocking_dependencies.join(", "));
        }
        Some(item.breakdown.clone())
    } else {
        return Err(format!("no open task or step with id '{id}'").into());
    };

    if let Some(b) = breakdown {
        println!("  priority          {:.2}", b.total);
        println!("  eisenhower        {:.2}", b.eisenhower);
        println!("  deadline pressure {:.2}", b.deadline_pressure);
        println!("  async urgency     {:.2}", b.async_urgency);
        println!("  cognitive match   {:.2} ({})", b.cognitive_match, b.productivity_level);
        println!("  context switch    {:.2}", b.context_switch_penalty);
    }
    for failure in result.failures_for(id) {
        println!("  failure: {}", failure.message);
        if failure.remediation.minimum_extension_hours > 0 {
            println!("    extend deadline by at least {}h", failure.remediation.minimum_extension_hours);
        }
        for candidate in &failure.remediation.defer_candidates {
            println!("    consider deferring {} ({})", candidate.item_id, candidate.name);
        }
    }
    Ok(())
}

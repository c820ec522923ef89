use std::path::Path;

use clap::Subcommand;
use slotwise_core::Scheduler;

use crate::common::{load_config, load_context, print_json, CliResult, ContextArgs};

#[derive(Subcommand)]
pub enum DeadlineAction {
    /// Check every open hard deadline without placing anything.
    /// Exits non-zero when one cannot be met.
    Check {
        #[command(flatten)]
        input: ContextArgs,
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: DeadlineAction, config_path: Option<&Path>) -> CliResult {
    match action {
        DeadlineAction::Check { input, json } => {
            let config = load_config(config_path)?;
            let context = load_context(&input, &config)?;
            let report = Scheduler::new(config.scheduler_config()).check_deadlines(&context);

            if json {
                print_json(&report)?;
            } else {
                for check in &report.checks {
                    let a = &check.assessment;
                    println!(
                        "{} {}: {:.1}h of work, {:.1}h left, slack {:.2} days",
                        if check.feasible { "ok  " } else { "FAIL" },
                        check.target_id,
                        a.critical_path_hours,
                        a.hours_until_deadline,
                        a.slack_days,
                    );
                }
                for failure in &report.failures {
                    let r = &failure.remediation;
                    println!(
                        "{}: extend by {}h (at daily capacity {}h)",
                        failure.item_id, r.minimum_extension_hours, r.capacity_extension_hours
                    );
                }
                if report.checks.is_empty() {
                    println!("no open hard deadlines");
                }
            }

            if !report.is_feasible() {
                return Err(format!("{} hard deadline(s) cannot be met", report.failures.len()).into());
            }
        }
    }
    Ok(())
}

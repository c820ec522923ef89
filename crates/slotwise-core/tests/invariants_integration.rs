//! Properties every scheduling run must hold, over generated inputs.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use slotwise_core::{
    schedule, BlockType, DailyWorkPattern, MeetingKind, SchedulingContext, SchedulingResult, Task, TaskType,
    WorkBlock, WorkMeeting,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

/// Same block and meeting ids every day, as a weekly template would produce.
fn day(offset: i64) -> DailyWorkPattern {
    let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap() + Duration::days(offset);
    DailyWorkPattern::new(date)
        .with_block(WorkBlock::new("am", "09:00", "12:00", BlockType::Focused))
        .with_block(WorkBlock::new("pm", "13:00", "17:00", BlockType::Mixed))
        .with_meeting(WorkMeeting::new("standup", "Standup", "14:00", "14:30", MeetingKind::Meeting))
}

#[derive(Debug, Clone)]
struct Draft {
    minutes: u32,
    admin: bool,
    importance: u8,
    urgency: u8,
    wait: u32,
    deps: Vec<usize>,
}

fn draft_strategy() -> impl Strategy<Value = Draft> {
    (
        1u32..=12,
        any::<bool>(),
        1u8..=10,
        1u8..=10,
        prop_oneof![Just(0u32), 15u32..=120],
        prop::collection::vec(0usize..12, 0..3),
    )
        .prop_map(|(quarters, admin, importance, urgency, wait, deps)| Draft {
            minutes: quarters * 15,
            admin,
            importance,
            urgency,
            wait,
            deps,
        })
}

fn build(drafts: &[Draft]) -> SchedulingContext {
    let mut context = SchedulingContext::new(now())
        .with_pattern(day(0))
        .with_pattern(day(1))
        .with_pattern(day(2));
    for (idx, draft) in drafts.iter().enumerate() {
        let mut task = Task::new(format!("t{idx}"), format!("Task {idx}"), draft.minutes)
            .with_scores(draft.importance, draft.urgency)
            .with_async_wait(draft.wait);
        if draft.admin {
            task = task.with_type(TaskType::Admin);
        }
        // only earlier tasks, so the graph stays acyclic
        for dep in draft.deps.iter().filter(|d| **d < idx) {
            task = task.depends_on(format!("t{dep}"));
        }
        context = context.with_task(task);
    }
    context
}

fn overlaps(a: (DateTime<Utc>, DateTime<Utc>), b: (DateTime<Utc>, DateTime<Utc>)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

fn check(result: &SchedulingResult, context: &SchedulingContext) -> Result<(), TestCaseError> {
    for block in &result.utilization {
        prop_assert!(block.focus_used <= block.focus_capacity, "{block:?}");
        prop_assert!(block.admin_used <= block.admin_capacity, "{block:?}");

        let booked: i64 = result
            .scheduled
            .iter()
            .filter(|s| s.is_work() && s.date == block.date && s.block_id.as_deref() == Some(block.block_id.as_str()))
            .map(|s| s.duration_minutes())
            .sum();
        prop_assert_eq!(i64::from(block.used_minutes), booked, "{} on {}", block.block_id, block.date);
    }

    let work: Vec<_> = result.scheduled.iter().filter(|s| s.is_work()).collect();
    let meetings: Vec<_> = result.scheduled.iter().filter(|s| s.is_blocked).collect();
    for (i, a) in work.iter().enumerate() {
        for b in &work[i + 1..] {
            prop_assert!(!overlaps((a.start_time, a.end_time), (b.start_time, b.end_time)));
        }
        for m in &meetings {
            prop_assert!(!overlaps((a.start_time, a.end_time), (m.start_time, m.end_time)));
        }
    }

    for task in &context.tasks {
        let placed = result.scheduled_work(&task.id);
        let missing = result.unscheduled_item(&task.id);
        prop_assert!(placed.is_some() != missing.is_some(), "{} must be placed or explained", task.id);

        let Some(placed) = placed else { continue };
        for dep_id in &task.dependencies {
            let dep = result.scheduled_work(dep_id);
            prop_assert!(dep.is_some(), "{} placed before its dependency {dep_id}", task.id);
            if let (Some(dep), Some(dep_task)) = (dep, context.tasks.iter().find(|t| &t.id == dep_id)) {
                let release = dep.end_time + Duration::minutes(i64::from(dep_task.async_wait_time));
                prop_assert!(placed.start_time >= release);
            }
        }
        prop_assert!(placed.start_time >= now());
    }
    Ok(())
}

proptest! {
    #[test]
    fn runs_respect_capacity_and_dependencies(drafts in prop::collection::vec(draft_strategy(), 1..12)) {
        let context = build(&drafts);
        let result = schedule(&context);
        check(&result, &context)?;
    }

    #[test]
    fn runs_are_deterministic(drafts in prop::collection::vec(draft_strategy(), 1..8)) {
        let context = build(&drafts);
        let first = schedule(&context);
        let second = schedule(&context);
        prop_assert_eq!(&first.fingerprint, &second.fingerprint);
        prop_assert_eq!(first, second);
    }
}

#[test]
fn fingerprint_tracks_content() {
    let base = build(&[Draft {
        minutes: 60,
        admin: false,
        importance: 5,
        urgency: 5,
        wait: 0,
        deps: Vec::new(),
    }]);
    let changed = base.clone().with_task(Task::new("extra", "Extra", 30));
    assert_eq!(schedule(&base).fingerprint.len(), 64);
    assert_ne!(schedule(&base).fingerprint, schedule(&changed).fingerprint);
}

//! Decoding JSON snapshots and running them end to end.

use slotwise_core::scheduler::ScheduledKind;
use slotwise_core::{schedule, DeadlineKind, SchedulingContext, TaskType};

const SNAPSHOT: &str = r#"{
  "current_time": "2026-03-02T08:00:00Z",
  "tasks": [
    { "id": "mail", "name": "Mail", "duration": 30, "task_type": "admin", "importance": 11 },
    { "id": "deep", "name": "Deep work", "duration": 90, "deadline": "2026-03-02T16:00:00Z", "deadline_type": "soft" }
  ],
  "workflows": [
    {
      "id": "wf",
      "name": "Release",
      "deadline": "2026-03-03T17:00:00Z",
      "steps": [
        { "id": "build", "name": "Build", "duration": 30, "async_wait_time": 45 },
        { "id": "ship", "name": "Ship", "duration": 15, "dependencies": ["Build"] }
      ]
    }
  ],
  "work_patterns": [
    {
      "date": "2026-03-02",
      "blocks": [ { "id": "day", "start_time": "09:00", "end_time": "17:00", "type": "mixed" } ],
      "meetings": [ { "id": "lunch", "name": "Lunch", "start_time": "12:00", "end_time": "13:00", "type": "break" } ]
    }
  ],
  "work_settings": { "utc_offset_minutes": 60 }
}"#;

#[test]
fn snapshot_decodes_with_defaults() {
    let context = SchedulingContext::from_json_str(SNAPSHOT).unwrap();
    assert_eq!(context.tasks.len(), 2);
    assert_eq!(context.tasks[0].task_type, TaskType::Admin);
    assert_eq!(context.tasks[1].urgency, 5);
    assert_eq!(context.tasks[1].deadline_type, DeadlineKind::Soft);
    assert_eq!(context.workflows[0].deadline_type, DeadlineKind::Hard);
    assert_eq!(context.work_settings.default_capacity.max_focus_hours, 4.0);
    assert_eq!(context.horizon().map(|(a, b)| a == b), Some(true));
}

#[test]
fn snapshot_schedules_and_clamps() {
    let context = SchedulingContext::from_json_str(SNAPSHOT).unwrap();
    let result = schedule(&context);

    // importance 11 is clamped and reported
    assert!(result.warnings.iter().any(|w| w.item_id.as_deref() == Some("mail")));
    let build = result.scheduled_work("build").unwrap();
    let ship = result.scheduled_work("ship").unwrap();
    assert!(ship.start_time >= build.end_time + chrono::Duration::minutes(45));
    assert!(result.scheduled.iter().any(|s| s.kind == ScheduledKind::AsyncWait));
    assert!(result
        .scheduled
        .iter()
        .any(|s| s.kind == ScheduledKind::Meeting && s.source_id == "lunch"));
}

#[test]
fn malformed_snapshot_is_an_error() {
    assert!(SchedulingContext::from_json_str("{\"tasks\": []}").is_err());
    assert!(SchedulingContext::from_json_str("not json").is_err());
}

#[test]
fn result_serializes_with_snake_case_tags() {
    let context = SchedulingContext::from_json_str(SNAPSHOT).unwrap();
    let json = serde_json::to_value(schedule(&context)).unwrap();
    let kinds: Vec<&str> = json["scheduled"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s["kind"].as_str())
        .collect();
    assert!(kinds.contains(&"workflow_step"));
    assert!(kinds.contains(&"async_wait"));
    assert_eq!(json["fingerprint"].as_str().map(str::len), Some(64));
}

//! Scheduler lifecycle specs
//!
//! Verify start, stop and recovery of tasks orphaned by a previous run.

use crate::prelude::*;
use crate::prelude::assert_eq;

#[tokio::test]
async fn start_then_stop() {
    let plant = Plant::new();
    assert_eq!(plant.scheduler.state(), SchedulerState::NotStarted);

    plant.scheduler.start().await.unwrap();
    assert_eq!(plant.scheduler.state(), SchedulerState::Running);

    plant.scheduler.stop().await.unwrap();
    assert_eq!(plant.scheduler.state(), SchedulerState::Stopped);
}

#[tokio::test]
async fn startup_schedule_runs_at_start() {
    let plant = Plant::new();
    plant.sh("hello", "exit 0").await;
    plant
        .save(Schedule::new("hello at boot", "hello", ScheduleKind::Startup))
        .await;

    let report = plant.scheduler.start().await.unwrap();
    assert_eq!(report.dispatched.len(), 1);

    let task = plant.wait_finished(report.dispatched[0].task_id).await;
    assert_eq!(task.state, TaskState::Complete);
    assert_eq!(task.exit_code, Some(0));
    assert!(task.end_time.unwrap() >= task.start_time);

    plant.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn tasks_orphaned_by_a_crash_are_interrupted_on_start() {
    let plant = Plant::new();
    plant.sh("sleeper", "exit 0").await;
    let orphan = {
        // A row left RUNNING with no scheduler watching it
        let storage = WalStorage::open(&plant.wal_path()).unwrap();
        let mut row = fledge_storage::Row::new();
        row.insert("id".into(), "6f1c0f0e-58a4-4a0b-9d8e-3c1f2b1a0c01".into());
        row.insert("process_name".into(), "sleeper".into());
        row.insert("state".into(), 1.into());
        row.insert("start_time".into(), "2026-01-05T10:00:00.000000Z".into());
        row.insert("end_time".into(), serde_json::Value::Null);
        row.insert("pid".into(), 4242.into());
        row.insert("exit_code".into(), serde_json::Value::Null);
        row.insert("reason".into(), serde_json::Value::Null);
        storage.insert_into_tbl("tasks", row).await.unwrap();
        "6f1c0f0e-58a4-4a0b-9d8e-3c1f2b1a0c01"
    };
    let plant = plant.reopen();

    plant.scheduler.start().await.unwrap();

    let task = plant.scheduler.get_task(orphan).await.unwrap();
    assert_eq!(task.state, TaskState::Interrupted);
    assert_eq!(task.reason.as_deref(), Some(RESTART_REASON));
    assert!(plant.running().await.is_empty());

    plant.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn stop_interrupts_tasks_that_outlive_the_grace_period() {
    let plant = Plant::with_config(|config| {
        config.stop_grace_period = Duration::from_millis(100);
    });
    plant.sh("sleeper", "exec sleep 30").await;
    let schedule = plant.manual("sleep", "sleeper").await;
    plant.scheduler.start().await.unwrap();
    let task = plant.run(schedule).await;

    let started = std::time::Instant::now();
    plant.scheduler.stop().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));

    let task = plant.task(task.id).await;
    assert_eq!(task.state, TaskState::Interrupted);
    assert_eq!(task.reason.as_deref(), Some(SHUTDOWN_REASON));
}

#[tokio::test]
async fn stop_lets_short_tasks_finish() {
    let plant = Plant::new();
    plant.sh("short", "sleep 0.2").await;
    let schedule = plant.manual("short", "short").await;
    plant.scheduler.start().await.unwrap();
    let task = plant.run(schedule).await;

    plant.scheduler.stop().await.unwrap();

    let task = plant.task(task.id).await;
    assert_eq!(task.state, TaskState::Complete);
}

//! Task dispatch specs
//!
//! Verify how tasks are launched and how their exits are recorded.

use crate::prelude::*;
use crate::prelude::assert_eq;

#[tokio::test]
async fn nonzero_exit_interrupts_the_task() {
    let plant = Plant::new();
    plant.sh("failing", "exit 3").await;
    let schedule = plant.manual("fail", "failing").await;
    plant.scheduler.start().await.unwrap();

    let task = plant.run(schedule).await;
    let task = plant.wait_finished(task.id).await;
    assert_eq!(task.state, TaskState::Interrupted);
    assert_eq!(task.exit_code, Some(3));
    assert_eq!(task.reason.as_deref(), Some("exited with code 3"));

    plant.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn task_sees_its_id_and_name() {
    let plant = Plant::new();
    plant
        .sh(
            "env dump",
            r#"printf %s "$FLEDGE_TASK_ID" > task_id.txt; printf %s "$0" > name.txt"#,
        )
        .await;
    let schedule = plant.manual("dump env", "env dump").await;
    plant.scheduler.start().await.unwrap();

    let task = plant.run(schedule).await;
    let task = plant.wait_finished(task.id).await;
    assert_eq!(task.state, TaskState::Complete);

    let seen = std::fs::read_to_string(plant.dir.path().join("task_id.txt")).unwrap();
    assert_eq!(seen, task.id.to_string());
    let name = std::fs::read_to_string(plant.dir.path().join("name.txt")).unwrap();
    assert_eq!(name, "--name=dump env");
    assert_eq!(TASK_ID_ENV, "FLEDGE_TASK_ID");

    plant.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn relative_scripts_resolve_against_working_dir() {
    let plant = Plant::new();
    let tasks_dir = plant.dir.path().join("tasks");
    std::fs::create_dir_all(&tasks_dir).unwrap();
    std::os::unix::fs::symlink("/bin/sh", tasks_dir.join("sh")).unwrap();

    plant
        .scheduler
        .register_process(ScheduledProcess::new(
            "hello",
            ["tasks/sh", "-c", "touch hello.ran"],
        ))
        .await
        .unwrap();
    let schedule = plant.manual("hello", "hello").await;
    plant.scheduler.start().await.unwrap();

    let task = plant.run(schedule).await;
    let task = plant.wait_finished(task.id).await;
    assert_eq!(task.state, TaskState::Complete);
    assert!(plant.dir.path().join("hello.ran").exists());

    plant.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn missing_program_is_a_launch_failure() {
    let plant = Plant::new();
    plant
        .scheduler
        .register_process(ScheduledProcess::new("ghost", ["/nonexistent/fledge-task"]))
        .await
        .unwrap();
    let schedule = plant.manual("ghost", "ghost").await;
    plant.scheduler.start().await.unwrap();

    let err = plant.scheduler.queue_task(schedule).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Launch);

    let tasks = plant.scheduler.get_tasks(&TaskQuery::new()).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].state, TaskState::Interrupted);
    assert!(tasks[0]
        .reason
        .as_deref()
        .unwrap()
        .starts_with("failed to launch"));

    plant.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn interval_schedule_follows_the_clock() {
    let plant = Plant::new();
    plant.sh("tick", "exit 0").await;
    plant
        .save(
            Schedule::new(
                "every 5 minutes",
                "tick",
                ScheduleKind::Interval {
                    repeat: Duration::from_secs(300),
                },
            )
            .with_exclusive(false),
        )
        .await;

    assert_eq!(plant.scheduler.start().await.unwrap().dispatched.len(), 1);

    plant.clock.advance(chrono::Duration::minutes(4));
    assert!(plant.scheduler.tick().await.unwrap().is_empty());

    plant.clock.advance(chrono::Duration::minutes(1));
    assert_eq!(plant.scheduler.tick().await.unwrap().dispatched.len(), 1);

    plant.scheduler.stop().await.unwrap();
    let tasks = plant.scheduler.get_tasks(&TaskQuery::new()).await.unwrap();
    assert_eq!(tasks.len(), 2);
}

#[tokio::test]
async fn exclusive_schedule_runs_one_task_at_a_time() {
    let plant = Plant::new();
    plant.sh("sleeper", "exec sleep 30").await;
    let schedule = plant.manual("sleep", "sleeper").await;
    plant.scheduler.start().await.unwrap();

    let task = plant.run(schedule).await;
    assert!(!plant.scheduler.queue_task(schedule).await.unwrap());
    assert_eq!(plant.running().await.len(), 1);

    plant
        .scheduler
        .cancel_task(&task.id.to_string())
        .await
        .unwrap();
    plant.scheduler.stop().await.unwrap();
}

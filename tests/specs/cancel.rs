//! Task cancellation specs
//!
//! Verify that canceling kills the process and the record stays canceled.

use crate::prelude::*;
use crate::prelude::assert_eq;

#[tokio::test]
async fn cancel_kills_a_running_task() {
    let plant = Plant::new();
    plant.sh("sleeper", "exec sleep 30").await;
    let schedule = plant.manual("sleep", "sleeper").await;
    plant.scheduler.start().await.unwrap();
    let task = plant.run(schedule).await;
    assert_eq!(task.state, TaskState::Running);
    assert!(task.pid.is_some());

    let canceled = plant
        .scheduler
        .cancel_task(&task.id.to_string())
        .await
        .unwrap();
    assert_eq!(canceled.state, TaskState::Canceled);
    assert_eq!(canceled.reason.as_deref(), Some(CANCEL_REASON));

    // Stopping returns promptly because the process is gone
    let started = std::time::Instant::now();
    plant.scheduler.stop().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(plant.task(task.id).await, canceled);
}

#[tokio::test]
async fn finished_task_cannot_be_canceled() {
    let plant = Plant::new();
    plant.sh("quick", "exit 0").await;
    let schedule = plant.manual("quick", "quick").await;
    plant.scheduler.start().await.unwrap();
    let task = plant.run(schedule).await;
    let task = plant.wait_finished(task.id).await;

    let err = plant
        .scheduler
        .cancel_task(&task.id.to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulerError::TaskNotRunning(_)));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(plant.task(task.id).await.state, TaskState::Complete);

    plant.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn cancel_racing_a_natural_exit_keeps_one_outcome() {
    let plant = Plant::with_config(|config| config.max_running_tasks = 100);
    plant.sh("blink", "exit 0").await;
    let schedule = plant
        .save(Schedule::new("blink", "blink", ScheduleKind::Manual).with_exclusive(false))
        .await;
    plant.scheduler.start().await.unwrap();

    for _ in 0..10 {
        let task = plant.run(schedule).await;
        let result = plant.scheduler.cancel_task(&task.id.to_string()).await;
        let stored = plant.wait_finished(task.id).await;
        match result {
            Ok(canceled) => assert_eq!(stored, canceled),
            Err(SchedulerError::TaskNotRunning(_)) => {
                assert_eq!(stored.state, TaskState::Complete)
            }
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    plant.scheduler.stop().await.unwrap();
}

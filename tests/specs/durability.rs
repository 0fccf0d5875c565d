//! Durability specs
//!
//! Verify that processes, schedules and task history survive a restart.

use crate::prelude::*;
use crate::prelude::assert_eq;
use std::io::Write;

#[tokio::test]
async fn schedules_and_history_survive_restart() {
    let plant = Plant::new();
    plant.sh("quick", "exit 0").await;
    let schedule = plant.manual("quick", "quick").await;
    plant.scheduler.start().await.unwrap();
    let task = plant.run(schedule).await;
    let task = plant.wait_finished(task.id).await;
    plant.scheduler.stop().await.unwrap();
    let schedules = plant.scheduler.get_schedules().await.unwrap();

    let plant = plant.reopen();

    assert_eq!(plant.scheduler.get_schedules().await.unwrap(), schedules);
    assert_eq!(plant.task(task.id).await, task);
    let processes = plant.scheduler.get_scheduled_processes().await.unwrap();
    assert_eq!(processes.len(), 1);
    assert_eq!(processes[0].name, "quick");
}

#[tokio::test]
async fn deleted_schedule_stays_deleted() {
    let plant = Plant::new();
    plant.sh("quick", "exit 0").await;
    let keep = plant.manual("keep", "quick").await;
    let doomed = plant.manual("doomed", "quick").await;
    plant.scheduler.delete_schedule(doomed).await.unwrap();

    let plant = plant.reopen();

    let names: Vec<String> = plant
        .scheduler
        .get_schedules()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["keep".to_string()]);
    assert!(plant.scheduler.get_schedule(&keep.to_string()).await.is_ok());
}

#[tokio::test]
async fn torn_write_is_discarded_on_restart() {
    let plant = Plant::new();
    plant.sh("quick", "exit 0").await;
    plant.manual("quick", "quick").await;
    let wal = plant.wal_path();
    {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&wal)
            .unwrap();
        file.write_all(b"{\"sequence\":99,\"op\":{\"op\":\"insert\",\"ta")
            .unwrap();
    }

    let plant = plant.reopen();
    assert_eq!(plant.scheduler.get_schedules().await.unwrap().len(), 1);

    // New writes land after the recovered entries
    plant.manual("after", "quick").await;
    let plant = plant.reopen();
    assert_eq!(plant.scheduler.get_schedules().await.unwrap().len(), 2);
}

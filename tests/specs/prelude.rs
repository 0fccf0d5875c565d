//! Shared fixtures for scheduler specs

pub use fledge_adapters::OsProcessAdapter;
pub use fledge_core::{
    FakeClock, Schedule, ScheduleId, ScheduleKind, ScheduledProcess, Task, TaskId, TaskQuery,
    TaskState, UuidIdGen,
};
pub use fledge_scheduler::{
    ErrorKind, Scheduler, SchedulerConfig, SchedulerError, SchedulerState, CANCEL_REASON,
    RESTART_REASON, SHUTDOWN_REASON, TASK_ID_ENV,
};
pub use fledge_storage::{StorageClient, WalStorage};
pub use similar_asserts::assert_eq;
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;
pub use std::time::Duration;

pub type PlantScheduler = Scheduler<WalStorage, OsProcessAdapter, FakeClock, UuidIdGen>;

/// A scheduler over a WAL in a temporary data directory
pub struct Plant {
    pub dir: tempfile::TempDir,
    pub clock: FakeClock,
    pub scheduler: PlantScheduler,
}

impl Plant {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(tune: impl FnOnce(&mut SchedulerConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::new();
        let scheduler = open_scheduler(dir.path(), clock.clone(), tune);
        Self {
            dir,
            clock,
            scheduler,
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        wal_path(self.dir.path())
    }

    /// Drop the scheduler and open a fresh one on the same WAL
    pub fn reopen(self) -> Self {
        let Plant { dir, clock, scheduler } = self;
        drop(scheduler);
        let scheduler = open_scheduler(dir.path(), clock.clone(), |_| {});
        Self {
            dir,
            clock,
            scheduler,
        }
    }

    /// Register a process that runs `script` under `/bin/sh -c`
    pub async fn sh(&self, name: &str, script: &str) {
        self.scheduler
            .register_process(ScheduledProcess::new(name, ["/bin/sh", "-c", script]))
            .await
            .unwrap();
    }

    pub async fn manual(&self, name: &str, process: &str) -> ScheduleId {
        self.save(Schedule::new(name, process, ScheduleKind::Manual))
            .await
    }

    pub async fn save(&self, schedule: Schedule) -> ScheduleId {
        self.scheduler
            .save_schedule(schedule)
            .await
            .unwrap()
            .id
            .unwrap()
    }

    pub async fn task(&self, id: TaskId) -> Task {
        self.scheduler.get_task(&id.to_string()).await.unwrap()
    }

    pub async fn running(&self) -> Vec<Task> {
        self.scheduler.get_running_tasks().await.unwrap()
    }

    /// Poll until the task leaves RUNNING
    pub async fn wait_finished(&self, id: TaskId) -> Task {
        for _ in 0..500 {
            let task = self.task(id).await;
            if task.state != TaskState::Running {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} still running", id);
    }

    /// Queue the schedule and return its new task, which may already have
    /// finished
    pub async fn run(&self, schedule: ScheduleId) -> Task {
        assert!(self.scheduler.queue_task(schedule).await.unwrap());
        let tasks = self.scheduler.get_tasks(&TaskQuery::new()).await.unwrap();
        tasks.last().cloned().unwrap()
    }
}

fn wal_path(dir: &Path) -> PathBuf {
    dir.join("storage.wal")
}

fn open_scheduler(
    dir: &Path,
    clock: FakeClock,
    tune: impl FnOnce(&mut SchedulerConfig),
) -> PlantScheduler {
    let mut config = SchedulerConfig {
        tick_interval: Duration::from_secs(3600),
        stop_grace_period: Duration::from_secs(5),
        working_dir: Some(dir.to_path_buf()),
        ..SchedulerConfig::default()
    };
    tune(&mut config);
    let storage = WalStorage::open(&wal_path(dir)).unwrap();
    Scheduler::new(
        Arc::new(storage),
        OsProcessAdapter::new(),
        clock,
        UuidIdGen,
        config,
    )
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fledge_core::{FakeClock, ScheduleKind, SequentialIdGen};
use fledge_scheduler::{SchedulerConfig, SchedulerState};
use fledge_storage::MemoryStorage;
use std::time::Duration;

const CONFIG: &str = r#"
[scheduler]
tick_interval = "1h"
stop_grace_period = "1s"

[[processes]]
name = "purge"
script = ["tasks/purge"]

[[processes]]
name = "stats"
script = ["tasks/statistics"]

[[schedules]]
name = "purge by hand"
process_name = "purge"
type = "manual"

[[schedules]]
name = "hourly stats"
process_name = "stats"
type = "interval"
repeat = "1h"
enabled = false
"#;

fn memory_scheduler() -> Scheduler<MemoryStorage, OsProcessAdapter, FakeClock, SequentialIdGen> {
    Scheduler::new(
        Arc::new(MemoryStorage::new()),
        OsProcessAdapter::new(),
        FakeClock::new(),
        SequentialIdGen::new(),
        SchedulerConfig::default(),
    )
}

#[test]
fn paths_live_in_data_dir() {
    let paths = Paths::new("/var/lib/fledge");
    assert_eq!(paths.config_path, PathBuf::from("/var/lib/fledge/fledge.toml"));
    assert_eq!(paths.wal_path, PathBuf::from("/var/lib/fledge/storage.wal"));
    assert_eq!(
        paths.log_path,
        PathBuf::from("/var/lib/fledge/logs/scheduler.log")
    );
}

#[test]
fn argument_wins_over_environment() {
    let paths = Paths::resolve(Some(PathBuf::from("/srv/fledge"))).unwrap();
    assert_eq!(paths.data_dir, PathBuf::from("/srv/fledge"));
}

#[tokio::test]
async fn seed_adds_only_missing_entries() {
    let scheduler = memory_scheduler();
    let config = DaemonConfig::parse(CONFIG).unwrap();

    let first = seed(&scheduler, &config).await.unwrap();
    assert_eq!(
        first,
        Seeded {
            processes: 2,
            schedules: 2
        }
    );
    let second = seed(&scheduler, &config).await.unwrap();
    assert_eq!(second, Seeded::default());

    let schedules = scheduler.get_schedules().await.unwrap();
    assert_eq!(schedules.len(), 2);
    assert_eq!(schedules[0].name, "purge by hand");
    assert_eq!(schedules[0].kind, ScheduleKind::Manual);
    assert!(!schedules[1].enabled);
}

#[tokio::test]
async fn seed_leaves_existing_entries_alone() {
    let scheduler = memory_scheduler();
    scheduler
        .register_process(fledge_core::ScheduledProcess::new("purge", ["/opt/purge"]))
        .await
        .unwrap();
    let config = DaemonConfig::parse(CONFIG).unwrap();

    let seeded = seed(&scheduler, &config).await.unwrap();
    assert_eq!(seeded.processes, 1);
    let purge = scheduler.get_scheduled_process("purge").await.unwrap();
    assert_eq!(purge.script, vec!["/opt/purge".to_string()]);
}

#[tokio::test]
async fn invalid_seed_names_the_schedule() {
    let scheduler = memory_scheduler();
    let config = DaemonConfig::parse(
        "[[schedules]]\nname = \"broken\"\nprocess_name = \"purge\"\ntype = \"timed\"\n",
    )
    .unwrap();

    let err = seed(&scheduler, &config).await.unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::Seed { ref name, source: ValidationError::MissingTime } if name == "broken"
    ));
}

#[tokio::test]
async fn seed_for_unknown_process_fails() {
    let scheduler = memory_scheduler();
    let config = DaemonConfig::parse(
        "[[schedules]]\nname = \"orphan\"\nprocess_name = \"missing\"\ntype = \"manual\"\n",
    )
    .unwrap();

    let err = seed(&scheduler, &config).await.unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::Scheduler(SchedulerError::UnknownProcess(_))
    ));
}

#[tokio::test]
async fn startup_locks_seeds_and_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::new(dir.path().join("data"));
    std::fs::create_dir_all(&paths.data_dir).unwrap();
    std::fs::write(&paths.config_path, CONFIG).unwrap();

    let daemon = startup(&paths).await.unwrap();
    assert_eq!(daemon.scheduler.state(), SchedulerState::Running);
    assert_eq!(daemon.scheduler.config().tick_interval, Duration::from_secs(3600));
    let pid = std::fs::read_to_string(&paths.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());

    let err = startup(&paths).await.err().unwrap();
    assert!(matches!(err, LifecycleError::LockFailed(_)));
    // The losing startup must not remove the winner's lock file
    assert!(paths.lock_path.exists());

    daemon.shutdown().await.unwrap();
    assert!(!paths.lock_path.exists());

    let daemon = startup(&paths).await.unwrap();
    assert_eq!(daemon.scheduler.get_schedules().await.unwrap().len(), 2);
    assert_eq!(
        daemon.scheduler.get_scheduled_processes().await.unwrap().len(),
        2
    );
    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn bad_config_fails_startup_and_releases_lock() {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::new(dir.path());
    std::fs::write(&paths.config_path, "[scheduler]\ntick_interval = 5\n").unwrap();

    let err = startup(&paths).await.err().unwrap();
    assert!(matches!(err, LifecycleError::Config(ConfigError::Parse { .. })));
    assert!(!paths.lock_path.exists());
    assert!(!paths.wal_path.exists());
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, seeding, shutdown.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use fledge_adapters::{OsProcessAdapter, ProcessAdapter, TracedProcessAdapter};
use fledge_core::{Clock, IdGen, SystemClock, UuidIdGen, ValidationError};
use fledge_scheduler::{Scheduler, SchedulerError};
use fledge_storage::{StorageClient, StorageError, WalStorage};
use fs2::FileExt;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, DaemonConfig, CONFIG_FILE};

/// Environment variable naming the data directory
pub const DATA_ENV: &str = "FLEDGE_DATA";

/// Scheduler with the concrete adapters the daemon runs
pub type DaemonScheduler =
    Scheduler<WalStorage, TracedProcessAdapter<OsProcessAdapter>, SystemClock, UuidIdGen>;

/// Files the daemon owns inside its data directory
#[derive(Debug, Clone)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub config_path: PathBuf,
    /// Lock/PID file
    pub lock_path: PathBuf,
    pub wal_path: PathBuf,
    pub log_path: PathBuf,
}

impl Paths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            config_path: data_dir.join(CONFIG_FILE),
            lock_path: data_dir.join("fledged.pid"),
            wal_path: data_dir.join("storage.wal"),
            log_path: data_dir.join("logs").join("scheduler.log"),
            data_dir,
        }
    }

    /// Data directory from the command line, else `FLEDGE_DATA`, else the
    /// platform's local data directory
    pub fn resolve(arg: Option<PathBuf>) -> Result<Self, LifecycleError> {
        if let Some(dir) = arg {
            return Ok(Self::new(dir));
        }
        if let Some(dir) = std::env::var_os(DATA_ENV).filter(|d| !d.is_empty()) {
            return Ok(Self::new(PathBuf::from(dir)));
        }
        let base = dirs::data_local_dir().ok_or(LifecycleError::NoDataDir)?;
        Ok(Self::new(base.join("fledge")))
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine data directory, set FLEDGE_DATA")]
    NoDataDir,

    #[error("failed to acquire lock: scheduler already running?")]
    LockFailed(#[source] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid seed {name}: {source}")]
    Seed {
        name: String,
        #[source]
        source: ValidationError,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Running daemon
pub struct Daemon {
    pub paths: Paths,
    // Held to keep the exclusive lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub scheduler: DaemonScheduler,
    pub start_time: Instant,
}

impl Daemon {
    /// Stop the scheduler gracefully and release the data directory
    pub async fn shutdown(self) -> Result<(), LifecycleError> {
        info!("shutting down");
        let stopped = self.scheduler.stop().await;

        if self.paths.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.paths.lock_path) {
                warn!(error = %e, "failed to remove lock file");
            }
        }

        stopped?;
        info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "shutdown complete"
        );
        Ok(())
    }
}

/// Start the daemon
pub async fn startup(paths: &Paths) -> Result<Daemon, LifecycleError> {
    std::fs::create_dir_all(&paths.data_dir)?;

    // Acquire the lock FIRST so two daemons never share a WAL
    let mut lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&paths.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    match startup_inner(paths).await {
        Ok(scheduler) => Ok(Daemon {
            paths: paths.clone(),
            lock_file,
            scheduler,
            start_time: Instant::now(),
        }),
        Err(e) => {
            // Only reached while holding the lock, so the file is ours
            let _ = std::fs::remove_file(&paths.lock_path);
            Err(e)
        }
    }
}

async fn startup_inner(paths: &Paths) -> Result<DaemonScheduler, LifecycleError> {
    // Load config BEFORE opening storage (fail fast on a bad file)
    let config = DaemonConfig::load(&paths.config_path)?;

    let storage = WalStorage::open(&paths.wal_path)?;
    let adapter = TracedProcessAdapter::new(OsProcessAdapter::new());
    let scheduler = Scheduler::new(
        Arc::new(storage),
        adapter,
        SystemClock,
        UuidIdGen,
        config.scheduler.clone(),
    );

    let seeded = seed(&scheduler, &config).await?;
    if seeded.processes > 0 || seeded.schedules > 0 {
        info!(
            processes = seeded.processes,
            schedules = seeded.schedules,
            "seeded configuration"
        );
    }

    let report = scheduler.start().await?;
    info!(
        data_dir = %paths.data_dir.display(),
        dispatched = report.dispatched.len(),
        failed = report.failed.len(),
        "scheduler running"
    );
    Ok(scheduler)
}

/// Counts of seeds that were added
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Seeded {
    pub processes: usize,
    pub schedules: usize,
}

/// Register configured processes and schedules whose names are not yet
/// present; existing entries are left untouched
pub async fn seed<S, P, C, I>(
    scheduler: &Scheduler<S, P, C, I>,
    config: &DaemonConfig,
) -> Result<Seeded, LifecycleError>
where
    S: StorageClient,
    P: ProcessAdapter,
    C: Clock,
    I: IdGen,
{
    let mut seeded = Seeded::default();

    for seed in &config.processes {
        match scheduler.get_scheduled_process(&seed.name).await {
            Ok(_) => continue,
            Err(SchedulerError::ProcessNotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        scheduler.register_process(seed.to_process()).await?;
        seeded.processes += 1;
    }

    for seed in &config.schedules {
        let schedule = seed.to_schedule().map_err(|source| LifecycleError::Seed {
            name: seed.name.clone(),
            source,
        })?;
        if scheduler.find_schedule_by_name(&seed.name).await?.is_some() {
            continue;
        }
        scheduler.save_schedule(schedule).await?;
        seeded.schedules += 1;
    }

    Ok(seeded)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

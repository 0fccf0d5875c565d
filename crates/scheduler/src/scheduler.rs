// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler loop and public API
//!
//! The scheduler owns the registries and the launcher. A single dispatch
//! lock serializes ticks, explicit task queueing and schedule deletion, so
//! the exclusivity check and the task it guards are never interleaved with
//! another dispatch.

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::launcher::{exit_reason, Launcher};
use crate::processes::ProcessRegistry;
use crate::query::lower;
use crate::schedules::ScheduleRegistry;
use crate::store::Store;
use crate::tasks::TaskRegistry;
use chrono::{DateTime, Utc};
use fledge_adapters::{ProcessAdapter, ProcessExit};
use fledge_core::{
    evaluate, Clock, IdGen, Schedule, ScheduleId, ScheduleQuery, ScheduleType, ScheduleUpdate,
    ScheduledProcess, Task, TaskId, TaskQuery, TaskState, Trigger, TriggerContext,
};
use fledge_storage::StorageClient;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Reason recorded on tasks still running when the scheduler stops
pub const SHUTDOWN_REASON: &str = "interrupted by scheduler shutdown";
/// Reason recorded on tasks canceled through the API
pub const CANCEL_REASON: &str = "canceled by request";

/// Lifecycle of a scheduler instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    NotStarted,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerState::NotStarted => write!(f, "not started"),
            SchedulerState::Running => write!(f, "running"),
            SchedulerState::Stopping => write!(f, "stopping"),
            SchedulerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Why a due schedule did not get a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// An exclusive schedule's process already has a running task
    Exclusive,
    /// `max_running_tasks` tasks are already running
    Capacity,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Exclusive => write!(f, "exclusive task already running"),
            BlockReason::Capacity => write!(f, "running task limit reached"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub schedule: String,
    pub task_id: TaskId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub schedule: String,
    pub reason: BlockReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failed {
    pub schedule: String,
    pub error: String,
}

/// Outcome of one pass over the enabled schedules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub dispatched: Vec<Dispatched>,
    pub skipped: Vec<Skipped>,
    pub failed: Vec<Failed>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.dispatched.is_empty() && self.skipped.is_empty() && self.failed.is_empty()
    }
}

enum Dispatch {
    Launched(TaskId),
    Blocked(BlockReason),
}

/// In-memory trigger bookkeeping for one schedule
#[derive(Debug, Clone, Copy)]
struct Arming {
    armed_at: DateTime<Utc>,
    last_fired: Option<DateTime<Utc>>,
}

/// A launched task whose process has not been reaped
#[derive(Debug, Clone, Copy)]
struct InFlight {
    schedule_id: Option<ScheduleId>,
    /// `None` while the process is being spawned
    pid: Option<u32>,
}

struct Ticker {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

struct Inner<S, P, C, I> {
    config: SchedulerConfig,
    clock: C,
    processes: ProcessRegistry<S>,
    schedules: ScheduleRegistry<S, I>,
    tasks: TaskRegistry<S, C, I>,
    launcher: Launcher<P>,
    state: Mutex<SchedulerState>,
    armings: Mutex<HashMap<ScheduleId, Arming>>,
    in_flight: Mutex<HashMap<TaskId, InFlight>>,
    task_exited: Notify,
    dispatch: tokio::sync::Mutex<()>,
    ticker: Mutex<Option<Ticker>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// The task scheduler
pub struct Scheduler<S, P, C, I> {
    inner: Arc<Inner<S, P, C, I>>,
}

impl<S, P, C, I> Clone for Scheduler<S, P, C, I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, P, C, I> Scheduler<S, P, C, I>
where
    S: StorageClient,
    P: ProcessAdapter,
    C: Clock,
    I: IdGen,
{
    pub fn new(storage: Arc<S>, adapter: P, clock: C, ids: I, config: SchedulerConfig) -> Self {
        let store = Store::new(storage, config.storage_retry);
        let processes = ProcessRegistry::new(store.clone());
        let schedules = ScheduleRegistry::new(store.clone(), processes.clone(), ids.clone());
        let tasks = TaskRegistry::new(store, clock.clone(), ids);
        let launcher = Launcher::new(
            adapter,
            config.working_dir.clone(),
            config.management.clone(),
        );

        Self {
            inner: Arc::new(Inner {
                config,
                clock,
                processes,
                schedules,
                tasks,
                launcher,
                state: Mutex::new(SchedulerState::NotStarted),
                armings: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                task_exited: Notify::new(),
                dispatch: tokio::sync::Mutex::new(()),
                ticker: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *lock(&self.inner.state)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    // -- Scheduled processes --

    pub async fn get_scheduled_processes(&self) -> Result<Vec<ScheduledProcess>, SchedulerError> {
        self.inner.processes.get_all().await
    }

    pub async fn get_scheduled_process(&self, name: &str) -> Result<ScheduledProcess, SchedulerError> {
        self.inner
            .processes
            .get(name)
            .await?
            .ok_or_else(|| SchedulerError::ProcessNotFound(name.to_string()))
    }

    pub async fn register_process(
        &self,
        process: ScheduledProcess,
    ) -> Result<ScheduledProcess, SchedulerError> {
        self.inner.processes.register(process).await
    }

    // -- Schedules --

    /// All schedules ordered by id
    pub async fn get_schedules(&self) -> Result<Vec<Schedule>, SchedulerError> {
        self.inner.schedules.get_all().await
    }

    pub async fn query_schedules(&self, query: &ScheduleQuery) -> Result<Vec<Schedule>, SchedulerError> {
        let payload = lower(query, self.inner.config.default_query_limit);
        self.inner.schedules.query(&payload).await
    }

    pub async fn get_schedule(&self, id: &str) -> Result<Schedule, SchedulerError> {
        let id: ScheduleId = id.parse()?;
        self.inner.schedules.get(id).await
    }

    pub async fn find_schedule_by_name(&self, name: &str) -> Result<Option<Schedule>, SchedulerError> {
        self.inner.schedules.find_by_name(name).await
    }

    /// Create a schedule (no id) or overwrite an existing one (id set).
    /// The saved schedule is re-armed from now.
    pub async fn save_schedule(&self, schedule: Schedule) -> Result<Schedule, SchedulerError> {
        let saved = match schedule.id {
            None => self.inner.schedules.create(schedule).await?,
            Some(id) => {
                self.inner
                    .schedules
                    .update(id, &ScheduleUpdate::replace_with(&schedule))
                    .await?
            }
        };
        if let Some(id) = saved.id {
            self.arm(id, false);
        }
        Ok(saved)
    }

    pub async fn enable_schedule(&self, id: ScheduleId) -> Result<(bool, String), SchedulerError> {
        let before = self.inner.schedules.get(id).await?;
        let result = self.inner.schedules.enable(id).await?;
        if !before.enabled {
            // A re-enabled startup schedule runs once more
            self.arm(id, before.schedule_type() == ScheduleType::Startup);
        }
        Ok(result)
    }

    pub async fn disable_schedule(&self, id: ScheduleId) -> Result<(bool, String), SchedulerError> {
        self.inner.schedules.disable(id).await
    }

    /// Delete a schedule unless one of its tasks is still running
    pub async fn delete_schedule(&self, id: ScheduleId) -> Result<(bool, String), SchedulerError> {
        let _dispatch = self.inner.dispatch.lock().await;
        let schedule = self.inner.schedules.get(id).await?;

        let own_task_running = lock(&self.inner.in_flight)
            .values()
            .any(|flight| flight.schedule_id == Some(id));
        let exclusive_conflict = schedule.exclusive
            && !self
                .inner
                .tasks
                .running_for_process(&schedule.process_name)
                .await?
                .is_empty();
        if own_task_running || exclusive_conflict {
            tracing::warn!(schedule = %schedule.name, schedule_id = %id, "refusing to delete busy schedule");
            return Err(SchedulerError::ScheduleBusy(schedule.name));
        }

        let result = self.inner.schedules.delete(id).await?;
        lock(&self.inner.armings).remove(&id);
        Ok(result)
    }

    /// Dispatch a schedule now, ignoring its timing.
    ///
    /// Returns `false` when the schedule is disabled or blocked by
    /// exclusivity or the running-task limit.
    pub async fn queue_task(&self, id: ScheduleId) -> Result<bool, SchedulerError> {
        let _dispatch = self.inner.dispatch.lock().await;
        self.expect_state(SchedulerState::Running)?;

        let schedule = self.inner.schedules.get(id).await?;
        if !schedule.enabled {
            tracing::info!(schedule = %schedule.name, "schedule disabled, not queueing task");
            return Ok(false);
        }

        match self.dispatch(&schedule).await? {
            Dispatch::Launched(task_id) => {
                tracing::info!(schedule = %schedule.name, task_id = %task_id, "queued task");
                Ok(true)
            }
            Dispatch::Blocked(reason) => {
                tracing::info!(schedule = %schedule.name, %reason, "task not queued");
                Ok(false)
            }
        }
    }

    // -- Tasks --

    pub async fn get_task(&self, id: &str) -> Result<Task, SchedulerError> {
        let id: TaskId = id.parse()?;
        self.inner.tasks.get(id).await
    }

    pub async fn get_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, SchedulerError> {
        let payload = lower(query, self.inner.config.default_query_limit);
        self.inner.tasks.query(&payload).await
    }

    pub async fn get_running_tasks(&self) -> Result<Vec<Task>, SchedulerError> {
        self.inner.tasks.running().await
    }

    /// Mark a running task CANCELED, then kill its process
    pub async fn cancel_task(&self, id: &str) -> Result<Task, SchedulerError> {
        let id: TaskId = id.parse()?;
        let task = self.inner.tasks.get(id).await?;
        if !task.is_running() {
            return Err(SchedulerError::TaskNotRunning(id));
        }

        let canceled = match self.inner.tasks.cancel(id, CANCEL_REASON).await {
            Ok(task) => task,
            // Lost the race against the process exit
            Err(SchedulerError::Transition(_)) => return Err(SchedulerError::TaskNotRunning(id)),
            Err(e) => return Err(e),
        };

        // A task still being spawned is killed by the dispatch path
        let pid = lock(&self.inner.in_flight)
            .get(&id)
            .and_then(|flight| flight.pid);
        if let Some(pid) = pid {
            if let Err(e) = self.inner.launcher.kill(pid).await {
                tracing::warn!(task_id = %id, pid, error = %e, "failed to kill canceled task");
            }
        }
        Ok(canceled)
    }

    // -- Lifecycle --

    /// Recover orphaned tasks, arm every schedule, run the startup sweep
    /// and start the periodic loop
    pub async fn start(&self) -> Result<TickReport, SchedulerError> {
        if self.inner.config.tick_interval.is_zero() {
            return Err(SchedulerError::InvalidConfig(
                "tick_interval must be positive".to_string(),
            ));
        }

        {
            let _dispatch = self.inner.dispatch.lock().await;
            self.swap_state(SchedulerState::NotStarted, SchedulerState::Running)?;
            if let Err(e) = self.prepare().await {
                *lock(&self.inner.state) = SchedulerState::NotStarted;
                return Err(e);
            }
        }
        tracing::info!(
            tick_interval = ?self.inner.config.tick_interval,
            max_running_tasks = self.inner.config.max_running_tasks,
            "scheduler started"
        );

        let report = match self.tick().await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "startup sweep failed");
                *lock(&self.inner.state) = SchedulerState::NotStarted;
                return Err(e);
            }
        };
        self.spawn_ticker();
        Ok(report)
    }

    async fn prepare(&self) -> Result<(), SchedulerError> {
        self.inner.tasks.interrupt_orphans().await?;
        let schedules = self.inner.schedules.get_all().await?;
        let now = self.inner.clock.now();
        let mut armings = lock(&self.inner.armings);
        armings.clear();
        for id in schedules.iter().filter_map(|s| s.id) {
            armings.insert(
                id,
                Arming {
                    armed_at: now,
                    last_fired: None,
                },
            );
        }
        Ok(())
    }

    fn spawn_ticker(&self) {
        let (shutdown, mut shutdown_rx) = oneshot::channel();
        let scheduler = self.clone();
        let period = self.inner.config.tick_interval;

        let handle = tokio::spawn(async move {
            // The startup sweep already ran, so the first tick is one period out
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    _ = interval.tick() => match scheduler.tick().await {
                        Ok(report) if !report.is_empty() => tracing::debug!(
                            dispatched = report.dispatched.len(),
                            skipped = report.skipped.len(),
                            failed = report.failed.len(),
                            "tick"
                        ),
                        Ok(_) => {}
                        Err(SchedulerError::WrongState { .. }) => break,
                        Err(e) => tracing::error!(error = %e, "tick failed"),
                    },
                }
            }
        });

        *lock(&self.inner.ticker) = Some(Ticker { shutdown, handle });
    }

    /// Stop the loop, give running tasks the grace period to finish, then
    /// interrupt and kill the rest
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        self.swap_state(SchedulerState::Running, SchedulerState::Stopping)?;
        tracing::info!("stopping scheduler");

        let ticker = lock(&self.inner.ticker).take();
        if let Some(Ticker { shutdown, handle }) = ticker {
            let _ = shutdown.send(());
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "scheduler loop ended abnormally");
            }
        }

        // Held to the end so nothing dispatches while stopping
        let _dispatch = self.inner.dispatch.lock().await;

        let deadline = Instant::now() + self.inner.config.stop_grace_period;
        loop {
            let exited = self.inner.task_exited.notified();
            tokio::pin!(exited);
            exited.as_mut().enable();

            let remaining = lock(&self.inner.in_flight).len();
            if remaining == 0 {
                break;
            }
            tracing::debug!(remaining, "waiting for running tasks");
            if tokio::time::timeout_at(deadline, exited).await.is_err() {
                break;
            }
        }

        let stragglers: Vec<(TaskId, InFlight)> = lock(&self.inner.in_flight)
            .iter()
            .map(|(id, flight)| (*id, *flight))
            .collect();
        for (task_id, flight) in stragglers {
            match self.inner.tasks.interrupt(task_id, None, SHUTDOWN_REASON).await {
                Ok(_) | Err(SchedulerError::Transition(_)) => {}
                Err(e) => tracing::error!(task_id = %task_id, error = %e, "failed to interrupt task"),
            }
            let Some(pid) = flight.pid else { continue };
            if let Err(e) = self.inner.launcher.kill(pid).await {
                tracing::warn!(task_id = %task_id, pid, error = %e, "failed to kill task");
            }
        }

        *lock(&self.inner.state) = SchedulerState::Stopped;
        tracing::info!("scheduler stopped");
        Ok(())
    }

    /// Evaluate every enabled schedule once and dispatch the due ones
    pub async fn tick(&self) -> Result<TickReport, SchedulerError> {
        let _dispatch = self.inner.dispatch.lock().await;
        self.expect_state(SchedulerState::Running)?;

        let now = self.inner.clock.now();
        let mut report = TickReport::default();

        for schedule in self.inner.schedules.get_all().await? {
            let Some(id) = schedule.id else { continue };
            if !schedule.enabled {
                continue;
            }

            let trigger = match evaluate(&schedule.kind, &self.trigger_context(id, now)) {
                Ok(trigger) => trigger,
                Err(e) => {
                    tracing::error!(schedule = %schedule.name, error = %e, "cannot evaluate schedule");
                    report.failed.push(Failed {
                        schedule: schedule.name,
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            let Trigger::Due { scheduled_for } = trigger else {
                continue;
            };
            tracing::debug!(schedule = %schedule.name, %scheduled_for, "schedule due");

            match self.dispatch(&schedule).await {
                Ok(Dispatch::Launched(task_id)) => {
                    self.record_fired(id, now);
                    report.dispatched.push(Dispatched {
                        schedule: schedule.name,
                        task_id,
                    });
                }
                Ok(Dispatch::Blocked(reason)) => {
                    tracing::info!(schedule = %schedule.name, %reason, "dispatch skipped");
                    report.skipped.push(Skipped {
                        schedule: schedule.name,
                        reason,
                    });
                }
                Err(e) => {
                    // A failed launch counts as fired so it is not retried every tick
                    if matches!(e, SchedulerError::ProcessLaunch { .. }) {
                        self.record_fired(id, now);
                    }
                    tracing::error!(schedule = %schedule.name, error = %e, "dispatch failed");
                    report.failed.push(Failed {
                        schedule: schedule.name,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Create and launch a task for `schedule`; caller holds the dispatch lock
    async fn dispatch(&self, schedule: &Schedule) -> Result<Dispatch, SchedulerError> {
        let inner = &self.inner;
        let process = inner
            .processes
            .get(&schedule.process_name)
            .await?
            .ok_or_else(|| SchedulerError::ProcessNotFound(schedule.process_name.clone()))?;

        if schedule.exclusive
            && !inner
                .tasks
                .running_for_process(&process.name)
                .await?
                .is_empty()
        {
            return Ok(Dispatch::Blocked(BlockReason::Exclusive));
        }
        if inner.tasks.running().await?.len() >= inner.config.max_running_tasks {
            return Ok(Dispatch::Blocked(BlockReason::Capacity));
        }

        let task = inner.tasks.create(&process.name).await?;
        lock(&inner.in_flight).insert(
            task.id,
            InFlight {
                schedule_id: schedule.id,
                pid: None,
            },
        );
        let launched = match inner.launcher.launch_spec(&process, schedule, task.id) {
            Ok(spec) => inner.launcher.spawn(&spec).await,
            Err(e) => Err(e),
        };
        let spawned = match launched {
            Ok(spawned) => spawned,
            Err(e) => {
                lock(&inner.in_flight).remove(&task.id);
                inner.task_exited.notify_waiters();
                let reason = format!("failed to launch: {}", e);
                if let Err(err) = inner.tasks.interrupt(task.id, None, &reason).await {
                    tracing::error!(task_id = %task.id, error = %err, "failed to record launch failure");
                }
                return Err(SchedulerError::ProcessLaunch {
                    process: process.name,
                    source: e,
                });
            }
        };

        if let Some(flight) = lock(&inner.in_flight).get_mut(&task.id) {
            flight.pid = Some(spawned.pid);
        }
        if let Err(e) = inner.tasks.set_pid(task.id, spawned.pid).await {
            tracing::warn!(task_id = %task.id, pid = spawned.pid, error = %e, "failed to record pid");
        }
        self.watch(task.id, spawned.exit);

        // Canceled while spawning: the cancel found no pid to kill
        match inner.tasks.get(task.id).await {
            Ok(current) if current.state == TaskState::Canceled => {
                tracing::info!(
                    task_id = %task.id,
                    pid = spawned.pid,
                    state = %current.state,
                    "killing task canceled during launch"
                );
                if let Err(e) = inner.launcher.kill(spawned.pid).await {
                    tracing::warn!(task_id = %task.id, pid = spawned.pid, error = %e, "failed to kill task");
                }
                return Ok(Dispatch::Launched(task.id));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "failed to re-read launched task")
            }
        }
        tracing::info!(
            task_id = %task.id,
            schedule = %schedule.name,
            process = %process.name,
            pid = spawned.pid,
            "task started"
        );
        Ok(Dispatch::Launched(task.id))
    }

    /// Record the task's end once its process exits
    fn watch(&self, task_id: TaskId, exit: oneshot::Receiver<ProcessExit>) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let exit = exit.await.ok();
            let result = match exit {
                Some(exit) if exit.success() => inner.tasks.complete(task_id, 0, None).await,
                other => {
                    let code = other.and_then(|e| e.code);
                    inner
                        .tasks
                        .interrupt(task_id, code, &exit_reason(other.as_ref()))
                        .await
                }
            };
            match result {
                Ok(_) => {}
                Err(SchedulerError::Transition(e)) => {
                    tracing::info!(task_id = %task_id, error = %e, "ignoring exit of finished task");
                }
                Err(e) => tracing::error!(task_id = %task_id, error = %e, "failed to record task exit"),
            }

            lock(&inner.in_flight).remove(&task_id);
            inner.task_exited.notify_waiters();
        });
    }

    fn expect_state(&self, expected: SchedulerState) -> Result<(), SchedulerError> {
        let actual = self.state();
        if actual == expected {
            Ok(())
        } else {
            Err(SchedulerError::WrongState { actual, expected })
        }
    }

    fn swap_state(&self, from: SchedulerState, to: SchedulerState) -> Result<(), SchedulerError> {
        let mut state = lock(&self.inner.state);
        if *state != from {
            return Err(SchedulerError::WrongState {
                actual: *state,
                expected: from,
            });
        }
        *state = to;
        Ok(())
    }

    /// Reset `armed_at` to now; `reset_fired` also forgets the last fire
    fn arm(&self, id: ScheduleId, reset_fired: bool) {
        let now = self.inner.clock.now();
        let mut armings = lock(&self.inner.armings);
        let arming = armings.entry(id).or_insert(Arming {
            armed_at: now,
            last_fired: None,
        });
        arming.armed_at = now;
        if reset_fired {
            arming.last_fired = None;
        }
    }

    fn trigger_context(&self, id: ScheduleId, now: DateTime<Utc>) -> TriggerContext {
        let mut armings = lock(&self.inner.armings);
        let arming = armings.entry(id).or_insert(Arming {
            armed_at: now,
            last_fired: None,
        });
        TriggerContext {
            now,
            last_fired: arming.last_fired,
            armed_at: arming.armed_at,
        }
    }

    fn record_fired(&self, id: ScheduleId, now: DateTime<Utc>) {
        let mut armings = lock(&self.inner.armings);
        let arming = armings.entry(id).or_insert(Arming {
            armed_at: now,
            last_fired: None,
        });
        arming.last_fired = Some(now);
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

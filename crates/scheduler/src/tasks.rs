// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of tasks
//!
//! Owns the persisted task lifecycle. Every read-check-write transition is
//! serialized so a task reaches exactly one terminal state even when its
//! exit, a cancellation and a shutdown race.

use crate::error::SchedulerError;
use crate::store::{format_time, RowReader, Store};
use chrono::SubsecRound;
use fledge_core::{Clock, IdGen, Task, TaskEvent, TaskId, TaskState};
use fledge_storage::{Payload, Row, SortDirection, StorageClient};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

pub(crate) const TABLE: &str = "tasks";

/// Reason recorded on tasks found RUNNING when the scheduler starts
pub const RESTART_REASON: &str = "interrupted by scheduler restart";

pub(crate) struct TaskRegistry<S, C, I> {
    store: Store<S>,
    clock: C,
    ids: I,
    transitions: Arc<Mutex<()>>,
}

impl<S: StorageClient, C: Clock, I: IdGen> TaskRegistry<S, C, I> {
    pub(crate) fn new(store: Store<S>, clock: C, ids: I) -> Self {
        Self {
            store,
            clock,
            ids,
            transitions: Arc::new(Mutex::new(())),
        }
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        // Storage keeps microseconds
        self.clock.now().trunc_subsecs(6)
    }

    /// Persist a new RUNNING task
    pub(crate) async fn create(&self, process_name: &str) -> Result<Task, SchedulerError> {
        let task = Task::new(TaskId(self.ids.next()), process_name, self.now());
        self.store.insert(TABLE, encode(&task)).await?;
        tracing::debug!(task_id = %task.id, process = %process_name, "created task");
        Ok(task)
    }

    pub(crate) async fn set_pid(&self, id: TaskId, pid: u32) -> Result<(), SchedulerError> {
        let mut values = Row::new();
        values.insert("pid".into(), Value::from(pid));
        let updated = self.store.update(TABLE, values, &by_id(id)).await?;
        if updated == 0 {
            return Err(SchedulerError::TaskNotFound(id.to_string()));
        }
        Ok(())
    }

    pub(crate) async fn complete(
        &self,
        id: TaskId,
        exit_code: i32,
        reason: Option<String>,
    ) -> Result<Task, SchedulerError> {
        self.transition(id, TaskEvent::Complete { exit_code, reason })
            .await
    }

    pub(crate) async fn cancel(&self, id: TaskId, reason: &str) -> Result<Task, SchedulerError> {
        self.transition(
            id,
            TaskEvent::Cancel {
                reason: reason.to_string(),
            },
        )
        .await
    }

    pub(crate) async fn interrupt(
        &self,
        id: TaskId,
        exit_code: Option<i32>,
        reason: &str,
    ) -> Result<Task, SchedulerError> {
        self.transition(
            id,
            TaskEvent::Interrupt {
                exit_code,
                reason: reason.to_string(),
            },
        )
        .await
    }

    /// Apply a state-machine event; terminal tasks reject every event
    async fn transition(
        &self,
        id: TaskId,
        event: TaskEvent,
    ) -> Result<Task, SchedulerError> {
        let _guard = self.transitions.lock().await;
        let task = self.get(id).await?;
        let next = task.transition(event, self.now())?;

        let mut values = Row::new();
        values.insert("state".into(), Value::from(next.state.code()));
        values.insert("end_time".into(), opt_time(next.end_time));
        values.insert("exit_code".into(), Value::from(next.exit_code));
        values.insert("reason".into(), Value::from(next.reason.clone()));
        self.store.update(TABLE, values, &by_id(id)).await?;

        tracing::info!(
            task_id = %id,
            process = %next.process_name,
            state = %next.state,
            exit_code = ?next.exit_code,
            reason = next.reason.as_deref().unwrap_or(""),
            "task finished"
        );
        Ok(next)
    }

    pub(crate) async fn get(&self, id: TaskId) -> Result<Task, SchedulerError> {
        let rows = self.store.query(TABLE, &by_id(id).limit(1)).await?;
        match rows.first() {
            Some(row) => decode(row),
            None => Err(SchedulerError::TaskNotFound(id.to_string())),
        }
    }

    /// RUNNING tasks, oldest first
    pub(crate) async fn running(&self) -> Result<Vec<Task>, SchedulerError> {
        self.query(&running().order_by("start_time", SortDirection::Asc))
            .await
    }

    pub(crate) async fn running_for_process(&self, name: &str) -> Result<Vec<Task>, SchedulerError> {
        self.query(
            &running()
                .where_eq("process_name", name)
                .order_by("start_time", SortDirection::Asc),
        )
        .await
    }

    pub(crate) async fn query(&self, payload: &Payload) -> Result<Vec<Task>, SchedulerError> {
        let rows = self.store.query(TABLE, payload).await?;
        rows.iter().map(decode).collect()
    }

    /// Interrupt tasks left RUNNING by a previous scheduler run
    pub(crate) async fn interrupt_orphans(&self) -> Result<Vec<Task>, SchedulerError> {
        let mut interrupted = Vec::new();
        for task in self.running().await? {
            match self.interrupt(task.id, None, RESTART_REASON).await {
                Ok(task) => interrupted.push(task),
                Err(SchedulerError::Transition(e)) => {
                    tracing::warn!(task_id = %task.id, error = %e, "orphan already finished");
                }
                Err(e) => return Err(e),
            }
        }
        if !interrupted.is_empty() {
            tracing::warn!(count = interrupted.len(), "interrupted orphaned tasks");
        }
        Ok(interrupted)
    }
}

fn by_id(id: TaskId) -> Payload {
    Payload::new().where_eq("id", id.to_string())
}

fn running() -> Payload {
    Payload::new().where_eq("state", TaskState::Running.code())
}

fn opt_time(time: Option<chrono::DateTime<chrono::Utc>>) -> Value {
    time.map(|t| Value::from(format_time(t))).unwrap_or(Value::Null)
}

fn encode(task: &Task) -> Row {
    let mut row = Row::new();
    row.insert("id".into(), Value::from(task.id.to_string()));
    row.insert("process_name".into(), Value::from(task.process_name.clone()));
    row.insert("state".into(), Value::from(task.state.code()));
    row.insert("start_time".into(), Value::from(format_time(task.start_time)));
    row.insert("end_time".into(), opt_time(task.end_time));
    row.insert("pid".into(), Value::from(task.pid));
    row.insert("exit_code".into(), Value::from(task.exit_code));
    row.insert("reason".into(), Value::from(task.reason.clone()));
    row
}

fn decode(row: &Row) -> Result<Task, SchedulerError> {
    let reader = RowReader::new(TABLE, row);
    let id: TaskId = reader
        .str("id")?
        .parse()
        .map_err(|e: fledge_core::InvalidId| reader.corrupt(e.to_string()))?;
    let state = TaskState::try_from(reader.int("state")?)?;
    let pid = reader
        .opt_int("pid")?
        .map(|pid| u32::try_from(pid).map_err(|_| reader.corrupt(format!("pid {} out of range", pid))))
        .transpose()?;
    let exit_code = reader
        .opt_int("exit_code")?
        .map(|code| {
            i32::try_from(code).map_err(|_| reader.corrupt(format!("exit code {} out of range", code)))
        })
        .transpose()?;

    Ok(Task {
        id,
        process_name: reader.str("process_name")?.to_string(),
        state,
        start_time: reader.time("start_time")?,
        end_time: reader.opt_time("end_time")?,
        pid,
        exit_code,
        reason: reader.opt_str("reason")?.map(str::to_string),
    })
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;

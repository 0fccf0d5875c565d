// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task state machine
//!
//! A task is one execution of a scheduled process. It is created RUNNING and
//! moves exactly once to a terminal state. Transitions are pure: they return
//! the new task and leave persistence to the caller.

use crate::id::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A persisted state integer outside 1-4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0} is not a valid State")]
pub struct InvalidTaskState(pub i64);

/// Lifecycle state of a task, persisted as 1-4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Running = 1,
    Complete = 2,
    Canceled = 3,
    Interrupted = 4,
}

impl TaskState {
    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Running)
    }
}

impl TryFrom<i64> for TaskState {
    type Error = InvalidTaskState;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(TaskState::Running),
            2 => Ok(TaskState::Complete),
            3 => Ok(TaskState::Canceled),
            4 => Ok(TaskState::Interrupted),
            other => Err(InvalidTaskState(other)),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Running => write!(f, "RUNNING"),
            TaskState::Complete => write!(f, "COMPLETE"),
            TaskState::Canceled => write!(f, "CANCELED"),
            TaskState::Interrupted => write!(f, "INTERRUPTED"),
        }
    }
}

/// Events that end a running task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// Process exited normally
    Complete {
        exit_code: i32,
        reason: Option<String>,
    },
    /// Cancellation was requested
    Cancel { reason: String },
    /// Process failed, was killed, or could not be started
    Interrupt {
        exit_code: Option<i32>,
        reason: String,
    },
}

impl TaskEvent {
    pub fn target_state(&self) -> TaskState {
        match self {
            TaskEvent::Complete { .. } => TaskState::Complete,
            TaskEvent::Cancel { .. } => TaskState::Canceled,
            TaskEvent::Interrupt { .. } => TaskState::Interrupted,
        }
    }
}

/// A transition was attempted on a task that already finished
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task {id} is already {state}, cannot move to {attempted}")]
pub struct TransitionError {
    pub id: TaskId,
    pub state: TaskState,
    pub attempted: TaskState,
}

/// One execution of a scheduled process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub process_name: String,
    pub state: TaskState,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    pub reason: Option<String>,
}

impl Task {
    /// Create a new task in the RUNNING state
    pub fn new(id: TaskId, process_name: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            id,
            process_name: process_name.into(),
            state: TaskState::Running,
            start_time,
            end_time: None,
            pid: None,
            exit_code: None,
            reason: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == TaskState::Running
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Pure transition to a terminal state
    ///
    /// Only RUNNING tasks may transition; a terminal task is never
    /// overwritten.
    pub fn transition(&self, event: TaskEvent, now: DateTime<Utc>) -> Result<Task, TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError {
                id: self.id,
                state: self.state,
                attempted: event.target_state(),
            });
        }

        let state = event.target_state();
        let (exit_code, reason) = match event {
            TaskEvent::Complete { exit_code, reason } => (Some(exit_code), reason),
            TaskEvent::Cancel { reason } => (self.exit_code, Some(reason)),
            TaskEvent::Interrupt { exit_code, reason } => (exit_code, Some(reason)),
        };

        Ok(Task {
            state,
            end_time: Some(now),
            exit_code,
            reason,
            ..self.clone()
        })
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;

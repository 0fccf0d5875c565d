// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler error taxonomy

use crate::scheduler::SchedulerState;
use fledge_adapters::ProcessError;
use fledge_core::{InvalidId, InvalidTaskState, TaskId, TransitionError, TriggerError, ValidationError};
use fledge_storage::StorageError;
use thiserror::Error;

/// Coarse classification of a [`SchedulerError`] for callers that map
/// errors onto responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Launch,
    Internal,
}

/// Errors surfaced by the registries and the scheduler
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    InvalidId(#[from] InvalidId),

    #[error("scheduled process {0} not found")]
    ProcessNotFound(String),

    #[error("schedule {0} not found")]
    ScheduleNotFound(String),

    #[error("task {0} not found")]
    TaskNotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("scheduled process {0} already exists")]
    DuplicateProcess(String),

    #[error("schedule name {0} is already in use")]
    DuplicateScheduleName(String),

    #[error("schedule refers to unknown scheduled process {0}")]
    UnknownProcess(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Trigger(#[from] TriggerError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("task {0} is not running")]
    TaskNotRunning(TaskId),

    #[error("schedule {0} has running tasks")]
    ScheduleBusy(String),

    #[error("scheduler is {actual}, expected {expected}")]
    WrongState {
        actual: SchedulerState,
        expected: SchedulerState,
    },

    #[error("failed to launch {process}: {source}")]
    ProcessLaunch {
        process: String,
        #[source]
        source: ProcessError,
    },

    #[error(transparent)]
    InvalidTaskState(#[from] InvalidTaskState),

    #[error("corrupt {table} row: {reason}")]
    CorruptRow { table: &'static str, reason: String },

    #[error("storage unavailable after {attempts} attempts: {source}")]
    StorageUnavailable {
        attempts: u32,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::ProcessNotFound(_)
            | SchedulerError::ScheduleNotFound(_)
            | SchedulerError::TaskNotFound(_) => ErrorKind::NotFound,

            SchedulerError::InvalidId(_)
            | SchedulerError::Validation(_)
            | SchedulerError::DuplicateProcess(_)
            | SchedulerError::DuplicateScheduleName(_)
            | SchedulerError::UnknownProcess(_)
            | SchedulerError::InvalidConfig(_)
            | SchedulerError::Trigger(_) => ErrorKind::Validation,

            SchedulerError::Transition(_)
            | SchedulerError::TaskNotRunning(_)
            | SchedulerError::ScheduleBusy(_)
            | SchedulerError::WrongState { .. } => ErrorKind::Conflict,

            SchedulerError::ProcessLaunch { .. } => ErrorKind::Launch,

            SchedulerError::InvalidTaskState(_)
            | SchedulerError::CorruptRow { .. }
            | SchedulerError::StorageUnavailable { .. }
            | SchedulerError::Storage(_) => ErrorKind::Internal,
        }
    }
}

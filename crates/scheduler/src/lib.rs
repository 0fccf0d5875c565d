// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fledge-scheduler: the Fledge task scheduler
//!
//! Registries for scheduled processes, schedules and tasks, the process
//! launcher, the periodic scheduler loop and the query facade consumed by
//! the management layer.

mod config;
mod error;
mod launcher;
mod processes;
mod query;
mod scheduler;
mod schedules;
mod store;
mod tasks;

pub use config::{ManagementAddress, RetryPolicy, SchedulerConfig};
pub use error::{ErrorKind, SchedulerError};
pub use launcher::{SCHEDULE_ID_ENV, TASK_ID_ENV};
pub use scheduler::{
    BlockReason, Dispatched, Failed, Scheduler, SchedulerState, Skipped, TickReport,
    CANCEL_REASON, SHUTDOWN_REASON,
};
pub use tasks::RESTART_REASON;

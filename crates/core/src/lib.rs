// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fledge-core: data model for the Fledge task scheduler
//!
//! This crate provides:
//! - Scheduled processes, schedules (as a sum type) and tasks
//! - The pure task state machine
//! - Clock/trigger evaluation for schedules
//! - The typed query AST used by the read-side facade
//! - Clock and id abstractions for deterministic tests

pub mod clock;
pub mod id;

pub mod process;
pub mod query;
pub mod schedule;
pub mod task;
pub mod trigger;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use id::{IdGen, InvalidId, ScheduleId, SequentialIdGen, TaskId, UuidIdGen};
pub use process::ScheduledProcess;
pub use query::{
    Column, Direction, Filter, Query, QueryError, ScheduleColumn, ScheduleQuery, SortKey,
    TaskColumn, TaskQuery, Value,
};
pub use schedule::{
    DayOfWeek, Schedule, ScheduleKind, ScheduleType, ScheduleUpdate, TimeOfDay, ValidationError,
};
pub use task::{InvalidTaskState, Task, TaskEvent, TaskState, TransitionError};
pub use trigger::{evaluate, Trigger, TriggerContext, TriggerError};

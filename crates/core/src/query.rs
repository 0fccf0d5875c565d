// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed read queries over tasks and schedules
//!
//! Callers build a small AST (an optional equality filter plus an ordered
//! sort-key list, with paging); the scheduler lowers it to a storage payload.
//! Evaluation order is always filter, sort, offset, limit.

use crate::task::TaskState;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A column name or direction that is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("unknown sort direction: {0} (expected asc or desc)")]
    UnknownDirection(String),
}

/// A queryable column of a persisted record
pub trait Column: Copy + fmt::Debug + PartialEq {
    /// Storage column name
    fn name(self) -> &'static str;
}

macro_rules! columns {
    ($(#[$meta:meta])* $ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $ty {
            $($variant),+
        }

        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];
        }

        impl Column for $ty {
            fn name(self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = QueryError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    other => Err(QueryError::UnknownColumn(other.to_string())),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

columns!(
    /// Columns of the `tasks` table
    TaskColumn {
        Id => "id",
        ProcessName => "process_name",
        State => "state",
        StartTime => "start_time",
        EndTime => "end_time",
        Pid => "pid",
        ExitCode => "exit_code",
        Reason => "reason",
    }
);

columns!(
    /// Columns of the `schedules` table
    ScheduleColumn {
        Id => "id",
        Name => "schedule_name",
        ProcessName => "process_name",
        Type => "schedule_type",
        Time => "schedule_time",
        Day => "schedule_day",
        Interval => "schedule_interval",
        Exclusive => "exclusive",
        Enabled => "enabled",
    }
);

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl FromStr for Direction {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            _ => Err(QueryError::UnknownDirection(s.to_string())),
        }
    }
}

/// Literal compared against a column
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<TaskState> for Value {
    fn from(state: TaskState) -> Self {
        Value::Int(state.code())
    }
}

/// A row filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter<C: Column> {
    /// `column = value`
    Eq { column: C, value: Value },
}

/// One key of a multi-key sort
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortKey<C: Column> {
    pub column: C,
    pub direction: Direction,
}

/// Filtered, sorted, paged read over one table
#[derive(Debug, Clone, PartialEq)]
pub struct Query<C: Column> {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub filter: Option<Filter<C>>,
    pub sort: Vec<SortKey<C>>,
}

impl<C: Column> Default for Query<C> {
    fn default() -> Self {
        Self {
            limit: None,
            offset: None,
            filter: None,
            sort: Vec::new(),
        }
    }
}

impl<C: Column> Query<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Keep only rows where `column = value`, replacing any earlier filter
    pub fn filter_eq(mut self, column: C, value: impl Into<Value>) -> Self {
        self.filter = Some(Filter::Eq {
            column,
            value: value.into(),
        });
        self
    }

    /// Append a sort key; earlier keys take precedence
    pub fn sort(mut self, column: C, direction: Direction) -> Self {
        self.sort.push(SortKey { column, direction });
        self
    }
}

pub type TaskQuery = Query<TaskColumn>;
pub type ScheduleQuery = Query<ScheduleColumn>;

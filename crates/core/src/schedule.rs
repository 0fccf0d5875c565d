// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule definitions
//!
//! A schedule is a persisted rule describing when to run a scheduled
//! process. The timing rule is a sum type: each variant carries exactly the
//! fields that are meaningful for it.

use crate::id::ScheduleId;
use chrono::{NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Seconds in a day; valid times of day are `0..SECONDS_PER_DAY`
pub const SECONDS_PER_DAY: u32 = 86_400;

/// Errors raised when a schedule or process definition is malformed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("schedule name must not be empty")]
    EmptyName,
    #[error("process name must not be empty")]
    EmptyProcessName,
    #[error("scheduled process {0} has an empty script")]
    EmptyScript(String),
    #[error("schedule time {0} is out of range (0-86399 seconds)")]
    TimeOutOfRange(i64),
    #[error("invalid time of day {0:?}, expected HH:MM:SS")]
    InvalidTimeFormat(String),
    #[error("schedule day {0} is out of range (1-7)")]
    DayOutOfRange(i64),
    #[error("timed schedules require a time")]
    MissingTime,
    #[error("interval schedules require a repeat interval")]
    MissingRepeat,
    #[error("repeat interval must be positive")]
    NonPositiveRepeat,
    #[error("{0} is not a valid schedule type")]
    InvalidScheduleType(i64),
}

/// Persisted discriminant of [`ScheduleKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    Startup = 1,
    Timed = 2,
    Interval = 3,
    Manual = 4,
}

impl ScheduleType {
    pub fn code(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for ScheduleType {
    type Error = ValidationError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(ScheduleType::Startup),
            2 => Ok(ScheduleType::Timed),
            3 => Ok(ScheduleType::Interval),
            4 => Ok(ScheduleType::Manual),
            other => Err(ValidationError::InvalidScheduleType(other)),
        }
    }
}

impl fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleType::Startup => write!(f, "STARTUP"),
            ScheduleType::Timed => write!(f, "TIMED"),
            ScheduleType::Interval => write!(f, "INTERVAL"),
            ScheduleType::Manual => write!(f, "MANUAL"),
        }
    }
}

/// Seconds since midnight, always within `0..86400`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    pub fn new(seconds: u32) -> Result<Self, ValidationError> {
        if seconds < SECONDS_PER_DAY {
            Ok(Self(seconds))
        } else {
            Err(ValidationError::TimeOutOfRange(i64::from(seconds)))
        }
    }

    pub fn hms(hour: u32, minute: u32, second: u32) -> Result<Self, ValidationError> {
        let formatted = || format!("{:02}:{:02}:{:02}", hour, minute, second);
        if minute >= 60 || second >= 60 {
            return Err(ValidationError::InvalidTimeFormat(formatted()));
        }
        let seconds = hour
            .checked_mul(3600)
            .and_then(|s| s.checked_add(minute * 60 + second))
            .ok_or_else(|| ValidationError::InvalidTimeFormat(formatted()))?;
        Self::new(seconds)
    }

    pub fn seconds(self) -> u32 {
        self.0
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_num_seconds_from_midnight_opt(self.0, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl TryFrom<u32> for TimeOfDay {
    type Error = ValidationError;

    fn try_from(seconds: u32) -> Result<Self, Self::Error> {
        Self::new(seconds)
    }
}

impl From<TimeOfDay> for u32 {
    fn from(time: TimeOfDay) -> Self {
        time.0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.to_naive_time();
        write!(f, "{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second())
    }
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidTimeFormat(s.to_string());
        let parts: Vec<&str> = s.trim().split(':').collect();
        let [h, m, sec] = parts.as_slice() else {
            return Err(invalid());
        };
        let h: u32 = h.parse().map_err(|_| invalid())?;
        let m: u32 = m.parse().map_err(|_| invalid())?;
        let sec: u32 = sec.parse().map_err(|_| invalid())?;
        Self::hms(h, m, sec)
    }
}

/// ISO weekday number: 1 = Monday through 7 = Sunday
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DayOfWeek(u8);

impl DayOfWeek {
    pub fn new(day: u8) -> Result<Self, ValidationError> {
        if (1..=7).contains(&day) {
            Ok(Self(day))
        } else {
            Err(ValidationError::DayOutOfRange(i64::from(day)))
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn weekday(self) -> Weekday {
        match self.0 {
            1 => Weekday::Mon,
            2 => Weekday::Tue,
            3 => Weekday::Wed,
            4 => Weekday::Thu,
            5 => Weekday::Fri,
            6 => Weekday::Sat,
            _ => Weekday::Sun,
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        // number_from_monday is always 1..=7
        Self(day.number_from_monday() as u8)
    }
}

impl TryFrom<u8> for DayOfWeek {
    type Error = ValidationError;

    fn try_from(day: u8) -> Result<Self, Self::Error> {
        Self::new(day)
    }
}

impl From<DayOfWeek> for u8 {
    fn from(day: DayOfWeek) -> Self {
        day.0
    }
}

/// When a schedule fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScheduleKind {
    /// Fires once when the scheduler starts
    Startup,
    /// Fires at a time of day, optionally only on one weekday
    Timed {
        time: TimeOfDay,
        #[serde(default)]
        day: Option<DayOfWeek>,
    },
    /// Fires every `repeat`
    Interval { repeat: Duration },
    /// Only fires on explicit request
    Manual,
}

impl ScheduleKind {
    /// Build a kind from the loosely typed, nullable per-variant fields used
    /// by storage rows and external callers
    pub fn from_parts(
        schedule_type: ScheduleType,
        time: Option<i64>,
        day: Option<i64>,
        repeat: Option<f64>,
    ) -> Result<Self, ValidationError> {
        match schedule_type {
            ScheduleType::Startup => Ok(ScheduleKind::Startup),
            ScheduleType::Manual => Ok(ScheduleKind::Manual),
            ScheduleType::Timed => {
                let time = time.ok_or(ValidationError::MissingTime)?;
                let time = u32::try_from(time)
                    .map_err(|_| ValidationError::TimeOutOfRange(time))
                    .and_then(TimeOfDay::new)?;
                let day = day
                    .map(|d| {
                        u8::try_from(d)
                            .map_err(|_| ValidationError::DayOutOfRange(d))
                            .and_then(DayOfWeek::new)
                    })
                    .transpose()?;
                Ok(ScheduleKind::Timed { time, day })
            }
            ScheduleType::Interval => {
                let secs = repeat.ok_or(ValidationError::MissingRepeat)?;
                let repeat = Duration::try_from_secs_f64(secs)
                    .map_err(|_| ValidationError::NonPositiveRepeat)?;
                let kind = ScheduleKind::Interval { repeat };
                kind.validate()?;
                Ok(kind)
            }
        }
    }

    pub fn schedule_type(&self) -> ScheduleType {
        match self {
            ScheduleKind::Startup => ScheduleType::Startup,
            ScheduleKind::Timed { .. } => ScheduleType::Timed,
            ScheduleKind::Interval { .. } => ScheduleType::Interval,
            ScheduleKind::Manual => ScheduleType::Manual,
        }
    }

    /// Check constraints the types alone do not enforce
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            ScheduleKind::Interval { repeat } if repeat.is_zero() => {
                Err(ValidationError::NonPositiveRepeat)
            }
            _ => Ok(()),
        }
    }
}

/// A persisted rule describing when to run a scheduled process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Assigned on first save
    pub id: Option<ScheduleId>,
    pub name: String,
    pub process_name: String,
    pub kind: ScheduleKind,
    pub enabled: bool,
    /// At most one task for this schedule's process may run at a time
    pub exclusive: bool,
}

impl Schedule {
    /// Create an unsaved schedule; enabled and exclusive by default
    pub fn new(name: impl Into<String>, process_name: impl Into<String>, kind: ScheduleKind) -> Self {
        Self {
            id: None,
            name: name.into(),
            process_name: process_name.into(),
            kind,
            enabled: true,
            exclusive: true,
        }
    }

    pub fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn schedule_type(&self) -> ScheduleType {
        self.kind.schedule_type()
    }

    /// Validate everything that can be checked without the registries
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.process_name.trim().is_empty() {
            return Err(ValidationError::EmptyProcessName);
        }
        self.kind.validate()
    }
}

/// Partial update of a saved schedule; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleUpdate {
    pub name: Option<String>,
    pub process_name: Option<String>,
    pub kind: Option<ScheduleKind>,
    pub enabled: Option<bool>,
    pub exclusive: Option<bool>,
}

impl ScheduleUpdate {
    /// An update that overwrites every mutable field with `schedule`'s values
    pub fn replace_with(schedule: &Schedule) -> Self {
        Self {
            name: Some(schedule.name.clone()),
            process_name: Some(schedule.process_name.clone()),
            kind: Some(schedule.kind.clone()),
            enabled: Some(schedule.enabled),
            exclusive: Some(schedule.exclusive),
        }
    }

    pub fn apply(&self, schedule: &Schedule) -> Schedule {
        Schedule {
            id: schedule.id,
            name: self.name.clone().unwrap_or_else(|| schedule.name.clone()),
            process_name: self
                .process_name
                .clone()
                .unwrap_or_else(|| schedule.process_name.clone()),
            kind: self.kind.clone().unwrap_or_else(|| schedule.kind.clone()),
            enabled: self.enabled.unwrap_or(schedule.enabled),
            exclusive: self.exclusive.unwrap_or(schedule.exclusive),
        }
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fledge.toml`: scheduler tuning plus processes and schedules to seed

use std::path::{Path, PathBuf};
use std::time::Duration;

use fledge_core::{
    DayOfWeek, Schedule, ScheduleKind, ScheduleType, ScheduledProcess, TimeOfDay,
    ValidationError,
};
use fledge_scheduler::SchedulerConfig;
use serde::Deserialize;
use thiserror::Error;

/// File name of the daemon configuration inside the data directory
pub const CONFIG_FILE: &str = "fledge.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub scheduler: SchedulerConfig,
    pub processes: Vec<ProcessSeed>,
    pub schedules: Vec<ScheduleSeed>,
}

impl DaemonConfig {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Read the configuration; a missing file means defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// A scheduled process registered at startup if absent
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessSeed {
    pub name: String,
    pub script: Vec<String>,
}

impl ProcessSeed {
    pub fn to_process(&self) -> ScheduledProcess {
        ScheduledProcess::new(self.name.as_str(), self.script.iter().cloned())
    }
}

fn enabled_by_default() -> bool {
    true
}

/// A schedule created at startup if no schedule has its name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleSeed {
    pub name: String,
    pub process_name: String,
    #[serde(rename = "type")]
    pub schedule_type: ScheduleType,
    /// `HH:MM:SS`, timed schedules only
    #[serde(default)]
    pub time: Option<String>,
    /// ISO weekday 1-7, timed schedules only
    #[serde(default)]
    pub day: Option<u8>,
    #[serde(default, with = "humantime_serde")]
    pub repeat: Option<Duration>,
    #[serde(default = "enabled_by_default")]
    pub exclusive: bool,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl ScheduleSeed {
    pub fn to_schedule(&self) -> Result<Schedule, ValidationError> {
        let kind = match self.schedule_type {
            ScheduleType::Startup => ScheduleKind::Startup,
            ScheduleType::Manual => ScheduleKind::Manual,
            ScheduleType::Timed => {
                let time: TimeOfDay = self
                    .time
                    .as_deref()
                    .ok_or(ValidationError::MissingTime)?
                    .parse()?;
                let day = self.day.map(DayOfWeek::new).transpose()?;
                ScheduleKind::Timed { time, day }
            }
            ScheduleType::Interval => ScheduleKind::Interval {
                repeat: self.repeat.ok_or(ValidationError::MissingRepeat)?,
            },
        };
        kind.validate()?;

        let schedule = Schedule::new(self.name.as_str(), self.process_name.as_str(), kind)
            .with_exclusive(self.exclusive)
            .with_enabled(self.enabled);
        schedule.validate()?;
        Ok(schedule)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

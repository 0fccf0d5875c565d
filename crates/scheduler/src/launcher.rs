// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process launcher: turns a scheduled process into a running child

use crate::config::ManagementAddress;
use fledge_adapters::{LaunchSpec, ProcessAdapter, ProcessError, ProcessExit, SpawnedProcess};
use fledge_core::{Schedule, ScheduledProcess, TaskId};
use std::path::PathBuf;

/// Environment variable carrying the task id
pub const TASK_ID_ENV: &str = "FLEDGE_TASK_ID";
/// Environment variable carrying the schedule id
pub const SCHEDULE_ID_ENV: &str = "FLEDGE_SCHEDULE_ID";

pub(crate) struct Launcher<P> {
    adapter: P,
    working_dir: Option<PathBuf>,
    management: Option<ManagementAddress>,
}

impl<P: ProcessAdapter> Launcher<P> {
    pub(crate) fn new(
        adapter: P,
        working_dir: Option<PathBuf>,
        management: Option<ManagementAddress>,
    ) -> Self {
        Self {
            adapter,
            working_dir,
            management,
        }
    }

    /// Build the command line and environment for one task
    pub(crate) fn launch_spec(
        &self,
        process: &ScheduledProcess,
        schedule: &Schedule,
        task_id: TaskId,
    ) -> Result<LaunchSpec, ProcessError> {
        let program = process.program().ok_or_else(|| {
            ProcessError::SpawnFailed(format!("scheduled process {} has an empty script", process.name))
        })?;
        let mut program = PathBuf::from(program);
        if let Some(dir) = &self.working_dir {
            if program.is_relative() {
                program = dir.join(program);
            }
        }

        let mut spec = LaunchSpec::new(program);
        spec.args.extend(process.args().iter().cloned());
        if let Some(management) = &self.management {
            spec = spec
                .arg(format!("--address={}", management.address))
                .arg(format!("--port={}", management.port));
        }
        spec = spec
            .arg(format!("--name={}", schedule.name))
            .env(TASK_ID_ENV, task_id.to_string());
        if let Some(id) = schedule.id {
            spec = spec.env(SCHEDULE_ID_ENV, id.to_string());
        }
        if let Some(dir) = &self.working_dir {
            spec = spec.cwd(dir.clone());
        }
        Ok(spec)
    }

    pub(crate) async fn spawn(&self, spec: &LaunchSpec) -> Result<SpawnedProcess, ProcessError> {
        self.adapter.spawn(spec).await
    }

    pub(crate) async fn kill(&self, pid: u32) -> Result<(), ProcessError> {
        self.adapter.kill(pid).await
    }
}

/// Reason recorded for a task whose process did not exit cleanly
pub(crate) fn exit_reason(exit: Option<&ProcessExit>) -> String {
    match exit {
        Some(ProcessExit {
            code: Some(code), ..
        }) => format!("exited with code {}", code),
        Some(ProcessExit {
            signal: Some(signal),
            ..
        }) => format!("terminated by signal {}", signal),
        Some(_) => "exited with unknown status".to_string(),
        None => "exit status lost".to_string(),
    }
}

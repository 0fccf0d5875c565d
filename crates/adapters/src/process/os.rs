// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OS process adapter

use super::{LaunchSpec, ProcessAdapter, ProcessError, ProcessExit, SpawnedProcess};
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use tokio::process::Command;
use tokio::sync::oneshot;

/// Launches real child processes via tokio
///
/// Each child is owned by a watcher task that reaps it and reports the exit.
/// `kill` signals the watcher, which kills and reaps the child.
#[derive(Clone, Default)]
pub struct OsProcessAdapter {
    kill_switches: Arc<Mutex<HashMap<u32, oneshot::Sender<()>>>>,
}

impl OsProcessAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn switches(&self) -> std::sync::MutexGuard<'_, HashMap<u32, oneshot::Sender<()>>> {
        self.kill_switches.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn exit_from_status(status: ExitStatus) -> ProcessExit {
    #[cfg(unix)]
    let signal = std::os::unix::process::ExitStatusExt::signal(&status);
    #[cfg(not(unix))]
    let signal = None;

    ProcessExit {
        code: status.code(),
        signal,
    }
}

#[async_trait]
impl ProcessAdapter for OsProcessAdapter {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<SpawnedProcess, ProcessError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null());
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ProcessError::SpawnFailed(format!("{}: {}", spec.program.display(), e)))?;
        let pid = child.id().ok_or_else(|| {
            ProcessError::SpawnFailed("process exited before reporting a pid".to_string())
        })?;

        let (kill_tx, kill_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        self.switches().insert(pid, kill_tx);

        let switches = Arc::clone(&self.kill_switches);
        tokio::spawn(async move {
            let finished = tokio::select! {
                status = child.wait() => Some(status),
                _ = kill_rx => None,
            };
            let status = match finished {
                Some(status) => status,
                None => {
                    if let Err(e) = child.start_kill() {
                        tracing::warn!(pid, error = %e, "failed to kill process");
                    }
                    child.wait().await
                }
            };
            switches
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&pid);

            let exit = match status {
                Ok(status) => exit_from_status(status),
                Err(e) => {
                    tracing::warn!(pid, error = %e, "failed to reap process");
                    ProcessExit {
                        code: None,
                        signal: None,
                    }
                }
            };
            // Receiver may be gone if nobody tracks this process any more
            let _ = exit_tx.send(exit);
        });

        Ok(SpawnedProcess { pid, exit: exit_rx })
    }

    async fn kill(&self, pid: u32) -> Result<(), ProcessError> {
        let switch = self.switches().remove(&pid).ok_or(ProcessError::NotFound(pid))?;
        switch.send(()).map_err(|_| ProcessError::KillFailed {
            pid,
            reason: "process already exited".to_string(),
        })
    }
}

#[cfg(all(test, unix))]
#[path = "os_tests.rs"]
mod tests;

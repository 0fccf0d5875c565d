// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process adapter for launching and stopping task processes

mod os;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use os::OsProcessAdapter;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeProcessAdapter, ProcessCall};

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors from process operations
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("no running process with pid {0}")]
    NotFound(u32),
    #[error("kill failed for pid {pid}: {reason}")]
    KillFailed { pid: u32, reason: String },
}

/// Everything needed to start one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// How a process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
    /// Terminating signal, if the process was killed by one
    pub signal: Option<i32>,
}

impl ProcessExit {
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => f.write_str("unknown exit status"),
        }
    }
}

/// A started process
///
/// `exit` resolves once when the process ends. If the sender is dropped
/// the exit status was lost.
#[derive(Debug)]
pub struct SpawnedProcess {
    pub pid: u32,
    pub exit: oneshot::Receiver<ProcessExit>,
}

/// Adapter for OS process management
#[async_trait]
pub trait ProcessAdapter: Clone + Send + Sync + 'static {
    /// Start a process; it runs detached from the caller
    async fn spawn(&self, spec: &LaunchSpec) -> Result<SpawnedProcess, ProcessError>;

    /// Forcefully stop a process started by this adapter
    async fn kill(&self, pid: u32) -> Result<(), ProcessError>;
}

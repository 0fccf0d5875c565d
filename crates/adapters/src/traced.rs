// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::process::{LaunchSpec, ProcessAdapter, ProcessError, SpawnedProcess};
use async_trait::async_trait;

/// Wrapper that adds tracing to any ProcessAdapter
#[derive(Clone)]
pub struct TracedProcessAdapter<P> {
    inner: P,
}

impl<P> TracedProcessAdapter<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: ProcessAdapter> ProcessAdapter for TracedProcessAdapter<P> {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<SpawnedProcess, ProcessError> {
        let span = tracing::info_span!("process.spawn", program = %spec.program.display());
        let _guard = span.enter();

        tracing::info!(args = ?spec.args, env_count = spec.env.len(), "starting");

        // Precondition: cwd must exist
        if let Some(cwd) = &spec.cwd {
            if !cwd.is_dir() {
                tracing::error!(cwd = %cwd.display(), "working directory does not exist");
                return Err(ProcessError::SpawnFailed(format!(
                    "working directory does not exist: {}",
                    cwd.display()
                )));
            }
        }

        let start = std::time::Instant::now();
        let result = self.inner.spawn(spec).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(spawned) => tracing::info!(
                pid = spawned.pid,
                elapsed_ms = elapsed.as_millis() as u64,
                "process started"
            ),
            Err(e) => tracing::error!(
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "spawn failed"
            ),
        }

        result
    }

    async fn kill(&self, pid: u32) -> Result<(), ProcessError> {
        let span = tracing::info_span!("process.kill", pid);
        let _guard = span.enter();

        let result = self.inner.kill(pid).await;
        // kill() failing is often acceptable (process already gone)
        match &result {
            Ok(()) => tracing::info!("killed"),
            Err(e) => tracing::warn!(error = %e, "kill failed (may be expected)"),
        }

        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;

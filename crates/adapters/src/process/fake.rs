// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake process adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{LaunchSpec, ProcessAdapter, ProcessError, ProcessExit, SpawnedProcess};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, Notify};

/// Signal number reported for killed fake processes
const SIGKILL: i32 = 9;

/// Recorded process call
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessCall {
    Spawn { spec: LaunchSpec },
    Kill { pid: u32 },
}

struct FakeState {
    next_pid: u32,
    running: HashMap<u32, oneshot::Sender<ProcessExit>>,
    specs: HashMap<u32, LaunchSpec>,
    calls: Vec<ProcessCall>,
    spawn_error: Option<String>,
    ignore_kill: bool,
    spawn_gate: Option<Arc<Notify>>,
    held_spawns: usize,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            next_pid: 1000,
            running: HashMap::new(),
            specs: HashMap::new(),
            calls: Vec::new(),
            spawn_error: None,
            ignore_kill: false,
            spawn_gate: None,
            held_spawns: 0,
        }
    }
}

/// Fake process adapter: processes run until the test ends them
#[derive(Clone, Default)]
pub struct FakeProcessAdapter {
    state: Arc<Mutex<FakeState>>,
}

impl FakeProcessAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ProcessCall> {
        self.lock().calls.clone()
    }

    /// Launch specs in spawn order
    pub fn spawned(&self) -> Vec<LaunchSpec> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ProcessCall::Spawn { spec } => Some(spec.clone()),
                ProcessCall::Kill { .. } => None,
            })
            .collect()
    }

    /// Pids of processes that have not ended, in ascending order
    pub fn running_pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.lock().running.keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    /// Launch spec of a process by pid
    pub fn spec(&self, pid: u32) -> Option<LaunchSpec> {
        self.lock().specs.get(&pid).cloned()
    }

    /// Make every later spawn fail with `message`; `None` restores success
    pub fn set_spawn_error(&self, message: Option<&str>) {
        self.lock().spawn_error = message.map(str::to_string);
    }

    /// Make `kill` succeed without ending the process
    pub fn set_ignore_kill(&self, ignore: bool) {
        self.lock().ignore_kill = ignore;
    }

    /// Make later spawns wait until [`release_spawns`](Self::release_spawns)
    pub fn hold_spawns(&self) {
        self.lock().spawn_gate = Some(Arc::new(Notify::new()));
    }

    /// Let held spawns proceed
    pub fn release_spawns(&self) {
        if let Some(gate) = self.lock().spawn_gate.take() {
            gate.notify_waiters();
        }
    }

    /// Number of spawns currently waiting on the gate
    pub fn held_spawns(&self) -> usize {
        self.lock().held_spawns
    }

    async fn wait_for_gate(&self) {
        let Some(gate) = self.lock().spawn_gate.clone() else {
            return;
        };
        let released = gate.notified();
        tokio::pin!(released);
        released.as_mut().enable();
        {
            let mut state = self.lock();
            if state.spawn_gate.is_none() {
                return;
            }
            state.held_spawns += 1;
        }
        released.await;
        self.lock().held_spawns -= 1;
    }

    /// End a process with an exit code; returns false if it was not running
    pub fn exit(&self, pid: u32, code: i32) -> bool {
        self.finish(pid, ProcessExit::code(code))
    }

    /// End a process with a signal; returns false if it was not running
    pub fn exit_with_signal(&self, pid: u32, signal: i32) -> bool {
        self.finish(pid, ProcessExit::signal(signal))
    }

    /// End a process without reporting a status
    pub fn lose(&self, pid: u32) -> bool {
        self.lock().running.remove(&pid).is_some()
    }

    fn finish(&self, pid: u32, exit: ProcessExit) -> bool {
        match self.lock().running.remove(&pid) {
            Some(sender) => {
                let _ = sender.send(exit);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ProcessAdapter for FakeProcessAdapter {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<SpawnedProcess, ProcessError> {
        self.wait_for_gate().await;
        let mut state = self.lock();
        state.calls.push(ProcessCall::Spawn { spec: spec.clone() });
        if let Some(message) = &state.spawn_error {
            return Err(ProcessError::SpawnFailed(message.clone()));
        }

        let pid = state.next_pid;
        state.next_pid += 1;
        let (tx, rx) = oneshot::channel();
        state.running.insert(pid, tx);
        state.specs.insert(pid, spec.clone());
        Ok(SpawnedProcess { pid, exit: rx })
    }

    async fn kill(&self, pid: u32) -> Result<(), ProcessError> {
        let mut state = self.lock();
        state.calls.push(ProcessCall::Kill { pid });
        if !state.running.contains_key(&pid) {
            return Err(ProcessError::NotFound(pid));
        }
        if state.ignore_kill {
            return Ok(());
        }
        if let Some(sender) = state.running.remove(&pid) {
            let _ = sender.send(ProcessExit::signal(SIGKILL));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;

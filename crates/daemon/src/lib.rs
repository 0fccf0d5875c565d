// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fledge-daemon: process host for the Fledge scheduler
//!
//! Loads `fledge.toml` from the data directory, locks the directory, opens
//! the WAL-backed store, seeds configured processes and schedules and runs
//! the scheduler until it is asked to stop.

pub mod config;
pub mod lifecycle;

pub use config::{ConfigError, DaemonConfig, ProcessSeed, ScheduleSeed, CONFIG_FILE};
pub use lifecycle::{seed, startup, Daemon, DaemonScheduler, LifecycleError, Paths, Seeded, DATA_ENV};

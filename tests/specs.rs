//! Behavioral specifications for the Fledge scheduler.
//!
//! These tests drive the public scheduler API against the WAL-backed store
//! and real `/bin/sh` child processes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/lifecycle.rs"]
mod lifecycle;

#[path = "specs/dispatch.rs"]
mod dispatch;

#[path = "specs/cancel.rs"]
mod cancel;

#[path = "specs/durability.rs"]
mod durability;

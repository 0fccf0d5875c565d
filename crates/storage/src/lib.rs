// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fledge-storage: table storage for the Fledge task scheduler

mod client;
mod memory;
mod payload;
mod wal;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use client::{Row, StorageClient, StorageError};
pub use memory::MemoryStorage;
pub use payload::{compare_values, Condition, Op, Payload, Sort, SortDirection};
pub use wal::{TableOp, Wal, WalEntry, WalStorage};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeStorage, StorageCall};

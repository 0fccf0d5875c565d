// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake storage client for testing

use crate::client::{Row, StorageClient, StorageError};
use crate::memory::MemoryStorage;
use crate::payload::Payload;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Recorded storage call
#[derive(Debug, Clone, PartialEq)]
pub enum StorageCall {
    Query { table: String },
    Insert { table: String },
    Update { table: String },
    Delete { table: String },
}

#[derive(Default)]
struct FakeState {
    calls: Vec<StorageCall>,
    successes_before_failure: usize,
    failures_remaining: usize,
    yield_first: bool,
}

/// In-memory storage that records calls and can fail on demand
#[derive(Clone, Default)]
pub struct FakeStorage {
    store: Arc<MemoryStorage>,
    state: Arc<Mutex<FakeState>>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls fail with a transient error
    pub fn fail_next(&self, count: usize) {
        self.fail_after(0, count);
    }

    /// Let `successes` calls through, then fail the `count` after them
    pub fn fail_after(&self, successes: usize, count: usize) {
        let mut state = self.lock();
        state.successes_before_failure = successes;
        state.failures_remaining = count;
    }

    /// Yield to the runtime before serving each call, as a remote store would
    pub fn set_yield_first(&self, yield_first: bool) {
        self.lock().yield_first = yield_first;
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<StorageCall> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls of any kind
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn record(&self, call: StorageCall) -> Result<(), StorageError> {
        let yield_first = self.lock().yield_first;
        if yield_first {
            tokio::task::yield_now().await;
        }
        let mut state = self.lock();
        state.calls.push(call);
        if state.successes_before_failure > 0 {
            state.successes_before_failure -= 1;
            return Ok(());
        }
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(StorageError::Transient("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn query_tbl(&self, table: &str) -> Result<Vec<Row>, StorageError> {
        self.record(StorageCall::Query {
            table: table.to_string(),
        })
        .await?;
        self.store.query_tbl(table).await
    }

    async fn query_tbl_with_payload(
        &self,
        table: &str,
        payload: &Payload,
    ) -> Result<Vec<Row>, StorageError> {
        self.record(StorageCall::Query {
            table: table.to_string(),
        })
        .await?;
        self.store.query_tbl_with_payload(table, payload).await
    }

    async fn insert_into_tbl(&self, table: &str, row: Row) -> Result<usize, StorageError> {
        self.record(StorageCall::Insert {
            table: table.to_string(),
        })
        .await?;
        self.store.insert_into_tbl(table, row).await
    }

    async fn update_tbl(
        &self,
        table: &str,
        values: Row,
        filter: &Payload,
    ) -> Result<usize, StorageError> {
        self.record(StorageCall::Update {
            table: table.to_string(),
        })
        .await?;
        self.store.update_tbl(table, values, filter).await
    }

    async fn delete_from_tbl(&self, table: &str, filter: &Payload) -> Result<usize, StorageError> {
        self.record(StorageCall::Delete {
            table: table.to_string(),
        })
        .await?;
        self.store.delete_from_tbl(table, filter).await
    }
}

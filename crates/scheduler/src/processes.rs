// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of scheduled processes

use crate::error::SchedulerError;
use crate::store::{RowReader, Store};
use fledge_core::ScheduledProcess;
use fledge_storage::{Payload, Row, SortDirection, StorageClient};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

pub(crate) const TABLE: &str = "scheduled_processes";

pub(crate) struct ProcessRegistry<S> {
    store: Store<S>,
    registrations: Arc<Mutex<()>>,
}

impl<S> Clone for ProcessRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            registrations: Arc::clone(&self.registrations),
        }
    }
}

impl<S: StorageClient> ProcessRegistry<S> {
    pub(crate) fn new(store: Store<S>) -> Self {
        Self {
            store,
            registrations: Arc::new(Mutex::new(())),
        }
    }

    /// Register a new process; names are unique and processes immutable
    pub(crate) async fn register(
        &self,
        process: ScheduledProcess,
    ) -> Result<ScheduledProcess, SchedulerError> {
        process.validate()?;
        let _guard = self.registrations.lock().await;
        if self.get(&process.name).await?.is_some() {
            return Err(SchedulerError::DuplicateProcess(process.name));
        }
        self.store.insert(TABLE, encode(&process)).await?;
        tracing::info!(process = %process.name, script = ?process.script, "registered scheduled process");
        Ok(process)
    }

    pub(crate) async fn get(&self, name: &str) -> Result<Option<ScheduledProcess>, SchedulerError> {
        let rows = self
            .store
            .query(TABLE, &Payload::new().where_eq("name", name).limit(1))
            .await?;
        rows.first().map(decode).transpose()
    }

    /// All processes ordered by name
    pub(crate) async fn get_all(&self) -> Result<Vec<ScheduledProcess>, SchedulerError> {
        let rows = self
            .store
            .query(TABLE, &Payload::new().order_by("name", SortDirection::Asc))
            .await?;
        rows.iter().map(decode).collect()
    }
}

fn encode(process: &ScheduledProcess) -> Row {
    let mut row = Row::new();
    row.insert("name".into(), Value::from(process.name.clone()));
    row.insert("script".into(), Value::from(process.script.clone()));
    row
}

fn decode(row: &Row) -> Result<ScheduledProcess, SchedulerError> {
    let reader = RowReader::new(TABLE, row);
    let name = reader.str("name")?;
    let script = match row.get("script") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<String>>>(),
        _ => None,
    }
    .ok_or_else(|| reader.corrupt(format!("script of {} is not a list of strings", name)))?;
    Ok(ScheduledProcess::new(name, script))
}

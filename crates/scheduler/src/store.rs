// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage access shared by the registries
//!
//! Wraps a [`StorageClient`] and retries transient failures per the
//! configured [`RetryPolicy`] before escalating them.

use crate::config::RetryPolicy;
use crate::error::SchedulerError;
use chrono::{DateTime, SecondsFormat, Utc};
use fledge_storage::{Payload, Row, StorageClient, StorageError};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

pub(crate) struct Store<S> {
    client: Arc<S>,
    retry: RetryPolicy,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            retry: self.retry,
        }
    }
}

impl<S: StorageClient> Store<S> {
    pub(crate) fn new(client: Arc<S>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    async fn with_retry<T, F, Fut>(
        &self,
        op: &'static str,
        table: &str,
        f: F,
    ) -> Result<T, SchedulerError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::warn!(op, table, attempt, error = %e, "transient storage error, retrying");
                    tokio::time::sleep(self.retry.backoff).await;
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    tracing::error!(op, table, attempts, error = %e, "storage unavailable");
                    return Err(SchedulerError::StorageUnavailable {
                        attempts,
                        source: e,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub(crate) async fn query(
        &self,
        table: &str,
        payload: &Payload,
    ) -> Result<Vec<Row>, SchedulerError> {
        let client = &*self.client;
        self.with_retry("query", table, || {
            client.query_tbl_with_payload(table, payload)
        })
        .await
    }

    pub(crate) async fn insert(&self, table: &str, row: Row) -> Result<(), SchedulerError> {
        let client = &*self.client;
        self.with_retry("insert", table, || client.insert_into_tbl(table, row.clone()))
            .await
            .map(|_| ())
    }

    pub(crate) async fn update(
        &self,
        table: &str,
        values: Row,
        filter: &Payload,
    ) -> Result<usize, SchedulerError> {
        let client = &*self.client;
        self.with_retry("update", table, || {
            client.update_tbl(table, values.clone(), filter)
        })
        .await
    }

    pub(crate) async fn delete(&self, table: &str, filter: &Payload) -> Result<usize, SchedulerError> {
        let client = &*self.client;
        self.with_retry("delete", table, || client.delete_from_tbl(table, filter))
            .await
    }
}

/// Typed column access for decoding rows strictly
pub(crate) struct RowReader<'a> {
    table: &'static str,
    row: &'a Row,
}

impl<'a> RowReader<'a> {
    pub(crate) fn new(table: &'static str, row: &'a Row) -> Self {
        Self { table, row }
    }

    pub(crate) fn corrupt(&self, reason: impl Into<String>) -> SchedulerError {
        SchedulerError::CorruptRow {
            table: self.table,
            reason: reason.into(),
        }
    }

    fn value(&self, column: &str) -> &'a Value {
        self.row.get(column).unwrap_or(&Value::Null)
    }

    pub(crate) fn str(&self, column: &str) -> Result<&'a str, SchedulerError> {
        self.value(column)
            .as_str()
            .ok_or_else(|| self.corrupt(format!("{} is not a string", column)))
    }

    pub(crate) fn opt_str(&self, column: &str) -> Result<Option<&'a str>, SchedulerError> {
        match self.value(column) {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            _ => Err(self.corrupt(format!("{} is not a string", column))),
        }
    }

    pub(crate) fn int(&self, column: &str) -> Result<i64, SchedulerError> {
        self.value(column)
            .as_i64()
            .ok_or_else(|| self.corrupt(format!("{} is not an integer", column)))
    }

    pub(crate) fn opt_int(&self, column: &str) -> Result<Option<i64>, SchedulerError> {
        match self.value(column) {
            Value::Null => Ok(None),
            value => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| self.corrupt(format!("{} is not an integer", column))),
        }
    }

    pub(crate) fn opt_float(&self, column: &str) -> Result<Option<f64>, SchedulerError> {
        match self.value(column) {
            Value::Null => Ok(None),
            value => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.corrupt(format!("{} is not a number", column))),
        }
    }

    pub(crate) fn bool(&self, column: &str) -> Result<bool, SchedulerError> {
        self.value(column)
            .as_bool()
            .ok_or_else(|| self.corrupt(format!("{} is not a boolean", column)))
    }

    pub(crate) fn time(&self, column: &str) -> Result<DateTime<Utc>, SchedulerError> {
        let raw = self.str(column)?;
        parse_time(raw).ok_or_else(|| self.corrupt(format!("{} is not a timestamp: {}", column, raw)))
    }

    pub(crate) fn opt_time(&self, column: &str) -> Result<Option<DateTime<Utc>>, SchedulerError> {
        match self.opt_str(column)? {
            None => Ok(None),
            Some(raw) => parse_time(raw)
                .map(Some)
                .ok_or_else(|| self.corrupt(format!("{} is not a timestamp: {}", column, raw))),
        }
    }
}

/// RFC 3339 UTC with fixed microseconds, so text order is time order
pub(crate) fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

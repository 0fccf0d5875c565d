// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory table store

use crate::client::{Row, StorageClient, StorageError};
use crate::payload::Payload;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Rows per table, kept in insertion order
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Tables {
    tables: BTreeMap<String, Vec<Row>>,
}

impl Tables {
    pub(crate) fn all(&self, table: &str) -> Vec<Row> {
        self.tables.get(table).cloned().unwrap_or_default()
    }

    pub(crate) fn select(&self, table: &str, payload: &Payload) -> Vec<Row> {
        match self.tables.get(table) {
            Some(rows) => payload.apply(rows),
            None => Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, table: &str, row: Row) -> usize {
        self.tables.entry(table.to_string()).or_default().push(row);
        1
    }

    pub(crate) fn update(&mut self, table: &str, values: &Row, filter: &Payload) -> usize {
        let Some(rows) = self.tables.get_mut(table) else {
            return 0;
        };
        let mut updated = 0;
        for row in rows.iter_mut().filter(|row| filter.matches(row)) {
            for (column, value) in values {
                row.insert(column.clone(), value.clone());
            }
            updated += 1;
        }
        updated
    }

    pub(crate) fn delete(&mut self, table: &str, filter: &Payload) -> usize {
        let Some(rows) = self.tables.get_mut(table) else {
            return 0;
        };
        let before = rows.len();
        rows.retain(|row| !filter.matches(row));
        before - rows.len()
    }
}

/// Volatile storage backend
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut tables)
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn query_tbl(&self, table: &str) -> Result<Vec<Row>, StorageError> {
        Ok(self.with_tables(|t| t.all(table)))
    }

    async fn query_tbl_with_payload(
        &self,
        table: &str,
        payload: &Payload,
    ) -> Result<Vec<Row>, StorageError> {
        Ok(self.with_tables(|t| t.select(table, payload)))
    }

    async fn insert_into_tbl(&self, table: &str, row: Row) -> Result<usize, StorageError> {
        Ok(self.with_tables(|t| t.insert(table, row)))
    }

    async fn update_tbl(
        &self,
        table: &str,
        values: Row,
        filter: &Payload,
    ) -> Result<usize, StorageError> {
        Ok(self.with_tables(|t| t.update(table, &values, filter)))
    }

    async fn delete_from_tbl(&self, table: &str, filter: &Payload) -> Result<usize, StorageError> {
        Ok(self.with_tables(|t| t.delete(table, filter)))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage client interface
//!
//! The scheduler treats storage as an opaque table store: pass a table name
//! and a structured payload, receive rows or affected-row counts.

use crate::payload::Payload;
use async_trait::async_trait;
use std::io;
use thiserror::Error;

/// A single table row: column name to JSON value
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage temporarily unavailable: {0}")]
    Transient(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    /// Whether retrying the same operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }
}

/// Table-oriented storage operations
#[async_trait]
pub trait StorageClient: Send + Sync + 'static {
    /// Return every row of `table` in insertion order
    async fn query_tbl(&self, table: &str) -> Result<Vec<Row>, StorageError>;

    /// Return the rows of `table` selected by `payload`
    /// (filter, then sort, then offset, then limit)
    async fn query_tbl_with_payload(
        &self,
        table: &str,
        payload: &Payload,
    ) -> Result<Vec<Row>, StorageError>;

    /// Append a row; returns the number of rows inserted
    async fn insert_into_tbl(&self, table: &str, row: Row) -> Result<usize, StorageError>;

    /// Overwrite `values` on every row matching `filter`'s conditions;
    /// returns the number of rows updated
    async fn update_tbl(
        &self,
        table: &str,
        values: Row,
        filter: &Payload,
    ) -> Result<usize, StorageError>;

    /// Remove every row matching `filter`'s conditions; returns the number
    /// of rows deleted
    async fn delete_from_tbl(&self, table: &str, filter: &Payload) -> Result<usize, StorageError>;
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log for durable storage
//!
//! Every mutation is appended as one JSON line carrying a sequence number
//! and a CRC32 checksum, fsync'd, and only then applied to the in-memory
//! tables. On open the log is replayed up to the first torn or corrupted
//! entry and the file is truncated there. A failed append is rolled back to
//! the last complete entry so later appends stay readable.

use crate::client::{Row, StorageClient, StorageError};
use crate::memory::Tables;
use crate::payload::Payload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A recorded table mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TableOp {
    Insert {
        table: String,
        row: Row,
    },
    Update {
        table: String,
        values: Row,
        filter: Payload,
    },
    Delete {
        table: String,
        filter: Payload,
    },
}

impl TableOp {
    pub(crate) fn apply(&self, tables: &mut Tables) -> usize {
        match self {
            TableOp::Insert { table, row } => tables.insert(table, row.clone()),
            TableOp::Update {
                table,
                values,
                filter,
            } => tables.update(table, values, filter),
            TableOp::Delete { table, filter } => tables.delete(table, filter),
        }
    }
}

/// A single line of the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    pub sequence: u64,
    pub op: TableOp,
    pub checksum: u32,
}

impl WalEntry {
    pub fn new(sequence: u64, op: TableOp) -> Self {
        let checksum = Self::calculate_checksum(&op);
        Self {
            sequence,
            op,
            checksum,
        }
    }

    fn calculate_checksum(op: &TableOp) -> u32 {
        // TableOp holds only strings and JSON values, so serialization cannot fail
        let json = serde_json::to_string(op).unwrap_or_default();
        crc32fast::hash(json.as_bytes())
    }

    /// Whether the checksum matches the operation
    pub fn verify(&self) -> bool {
        self.checksum == Self::calculate_checksum(&self.op)
    }
}

/// Append-only operation log
pub struct Wal {
    path: PathBuf,
    file: File,
    sequence: u64,
    /// Byte length of the complete entries in the file
    len: u64,
}

impl Wal {
    /// Open or create a log, returning it with the valid operations it holds
    pub fn open(path: &Path) -> Result<(Self, Vec<TableOp>), StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let (entries, valid_len) = Self::scan(path)?;
        let sequence = entries.last().map(|e| e.sequence).unwrap_or(0);

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if file.metadata()?.len() > valid_len {
            tracing::warn!(
                path = %path.display(),
                valid_len,
                "truncating WAL after last valid entry"
            );
            file.set_len(valid_len)?;
        }

        let ops = entries.into_iter().map(|e| e.op).collect();
        Ok((
            Self {
                path: path.to_path_buf(),
                file,
                sequence,
                len: valid_len,
            },
            ops,
        ))
    }

    /// Read valid entries and the byte length they occupy
    fn scan(path: &Path) -> Result<(Vec<WalEntry>, u64), StorageError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();
        let mut valid_len = 0u64;
        let mut line = String::new();

        loop {
            line.clear();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                break;
            }
            // A line without its newline is a torn write
            if !line.ends_with('\n') {
                break;
            }
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                valid_len += read as u64;
                continue;
            }
            match serde_json::from_str::<WalEntry>(trimmed) {
                Ok(entry) if entry.verify() => {
                    entries.push(entry);
                    valid_len += read as u64;
                }
                Ok(entry) => {
                    tracing::warn!(sequence = entry.sequence, "WAL checksum mismatch");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "unreadable WAL entry");
                    break;
                }
            }
        }

        Ok((entries, valid_len))
    }

    /// Append an operation and fsync; returns its sequence number
    ///
    /// On failure the file is cut back to its last complete entry.
    pub fn append(&mut self, op: &TableOp) -> Result<u64, StorageError> {
        let entry = WalEntry::new(self.sequence + 1, op.clone());
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let end = self.file.metadata()?.len();
        if end != self.len {
            tracing::warn!(
                path = %self.path.display(),
                end,
                valid_len = self.len,
                "discarding partial WAL entry before append"
            );
            self.file.set_len(self.len)?;
        }

        if let Err(e) = self.write_line(line.as_bytes()) {
            if let Err(rollback) = self.file.set_len(self.len) {
                tracing::error!(
                    path = %self.path.display(),
                    error = %rollback,
                    "failed to roll back partial WAL entry"
                );
            }
            return Err(e.into());
        }

        self.len += line.len() as u64;
        self.sequence = entry.sequence;
        Ok(self.sequence)
    }

    fn write_line(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.file.write_all(bytes)?;
        self.file.sync_all()
    }

    /// Sequence number of the last appended entry
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct Inner {
    wal: Wal,
    tables: Tables,
}

/// Durable storage backend: in-memory tables rebuilt from a WAL
pub struct WalStorage {
    inner: Mutex<Inner>,
}

impl WalStorage {
    /// Open the log at `path` and replay it
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let (wal, ops) = Wal::open(path)?;
        let mut tables = Tables::default();
        for op in &ops {
            op.apply(&mut tables);
        }
        tracing::info!(
            path = %path.display(),
            entries = ops.len(),
            "replayed storage log"
        );
        Ok(Self {
            inner: Mutex::new(Inner { wal, tables }),
        })
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&inner.tables)
    }

    fn write(&self, op: TableOp) -> Result<usize, StorageError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.wal.append(&op)?;
        Ok(op.apply(&mut inner.tables))
    }
}

#[async_trait]
impl StorageClient for WalStorage {
    async fn query_tbl(&self, table: &str) -> Result<Vec<Row>, StorageError> {
        Ok(self.read(|t| t.all(table)))
    }

    async fn query_tbl_with_payload(
        &self,
        table: &str,
        payload: &Payload,
    ) -> Result<Vec<Row>, StorageError> {
        Ok(self.read(|t| t.select(table, payload)))
    }

    async fn insert_into_tbl(&self, table: &str, row: Row) -> Result<usize, StorageError> {
        self.write(TableOp::Insert {
            table: table.to_string(),
            row,
        })
    }

    async fn update_tbl(
        &self,
        table: &str,
        values: Row,
        filter: &Payload,
    ) -> Result<usize, StorageError> {
        self.write(TableOp::Update {
            table: table.to_string(),
            values,
            filter: filter.clone(),
        })
    }

    async fn delete_from_tbl(&self, table: &str, filter: &Payload) -> Result<usize, StorageError> {
        self.write(TableOp::Delete {
            table: table.to_string(),
            filter: filter.clone(),
        })
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;

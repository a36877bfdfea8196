// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Storage error types.

use super::RecordId;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unknown table: {name}")]
    UnknownTable { name: String },

    #[error("unknown index on table {table}: columns {columns:?}")]
    UnknownIndex { table: String, columns: Vec<String> },

    #[error("record not found at {rid:?}")]
    RecordNotFound { rid: RecordId },

    #[error("record length {len} does not match table record size {expected}")]
    RecordSizeMismatch { len: usize, expected: usize },

    #[error("duplicate index entry for key {key:?}")]
    DuplicateIndexEntry { key: Vec<u8> },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! BariumDB: an embedded relational storage core with hierarchical
//! two-phase locking and index-aware transaction rollback
//!
//! This crate provides the transactional heart of a small relational
//! engine: a multi-granularity lock manager with no-wait deadlock
//! prevention, and a transaction manager that drives begin/commit/abort and
//! undoes uncommitted mutations against the record files and secondary
//! indexes behind it.

pub mod storage;
pub mod txn;

pub use storage::{
    Catalog, IndexColumn, IndexHandle, IndexMeta, LogManager, MemCatalog, MemIndex, MemLogManager,
    MemRecordStore, Record, RecordId, RecordStore, StorageError, TableId, TableMeta,
};
pub use txn::{
    GroupLockMode, LockDataId, LockManager, LockMode, LockRequest, QueueState, Transaction,
    TransactionManager, TransactionState, TxnError, TxnId, WriteRecord,
};

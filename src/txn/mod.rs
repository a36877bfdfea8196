// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transactional concurrency core: hierarchical two-phase locking and
//! transaction lifecycle with index-aware rollback.
//!
//! # Key Concepts
//!
//! ## Multi-granularity locking
//!
//! Locks are taken on two granularities. A transaction announces its intent
//! at the table level (IS before reading rows, IX before writing rows) and
//! then locks individual records in S or X. Whole-table reads and writes
//! take table-level S and X; a table-level reader that also writes some rows
//! holds SIX. Each resource's queue tracks the *group mode*, the strongest
//! mode currently granted, which is the fast predicate new requests are
//! checked against.
//!
//! ## No-wait deadlock prevention
//!
//! An acquire that cannot be granted immediately never blocks. It fails with
//! [`TxnError::DeadlockPrevention`] and the caller must abort the
//! transaction. There is no wait queue and no deadlock detector; every
//! decision happens synchronously under one global latch.
//!
//! ## Two-phase locking
//!
//! A transaction acquires locks only while growing and releases only while
//! shrinking. The first acquire moves it from `Default` to `Growing`; the
//! first release moves it to `Shrinking`; an acquire after that fails with
//! [`TxnError::LockOnShrinking`]. Commit and abort release everything and
//! park the transaction in a terminal state.
//!
//! ## Rollback
//!
//! Every heap mutation is recorded in the transaction's write set with the
//! pre-image rollback needs. Abort replays that log newest-to-oldest,
//! compensating against the record file and every secondary index through
//! the [`crate::storage`] seams.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use bariumdb::storage::{
//!     Catalog, IndexColumn, IndexMeta, MemCatalog, MemLogManager, RecordStore,
//! };
//! use bariumdb::txn::{LockManager, TransactionManager, WriteRecord};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Arc::new(MemCatalog::new());
//! let table = catalog.create_table(
//!     "accounts",
//!     8,
//!     vec![IndexMeta::new(vec![IndexColumn {
//!         name: "id".to_string(),
//!         offset: 0,
//!         len: 4,
//!     }])],
//! );
//! let lock_manager = Arc::new(LockManager::new());
//! let manager = TransactionManager::new(Arc::clone(&lock_manager), Arc::clone(&catalog));
//! let log = MemLogManager::new();
//!
//! // Begin, insert one row under IX + X locks, and commit.
//! let txn = manager.begin(None, &log);
//! let mut guard = txn.write();
//! lock_manager.lock_intention_exclusive_on_table(&mut guard, table)?;
//! let rid = catalog
//!     .records("accounts")?
//!     .insert_record(b"\x07\x00\x00\x00gold", guard.id())?;
//! lock_manager.lock_exclusive_on_record(&mut guard, rid, table)?;
//! guard.append_write(WriteRecord::Insert {
//!     table: "accounts".to_string(),
//!     rid,
//! });
//! manager.commit(&mut guard, &log)?;
//! assert!(guard.is_committed());
//! # Ok(())
//! # }
//! ```

mod error;
mod lock;
mod lock_manager;
mod manager;
mod transaction;

pub use error::TxnError;
pub use lock::{GroupLockMode, LockDataId, LockMode, LockRequest, QueueState};
pub use lock_manager::LockManager;
pub use manager::TransactionManager;
pub use transaction::{Transaction, TransactionState, TxnId, WriteRecord};

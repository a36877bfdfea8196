// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction lifecycle: begin, commit, abort with index-aware rollback.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::storage::{Catalog, IndexHandle, LogManager, RecordStore};

use super::error::TxnError;
use super::lock::LockDataId;
use super::lock_manager::LockManager;
use super::transaction::{Transaction, TransactionState, TxnId, WriteRecord};

struct TxnRegistry {
    next_txn_id: u64,
    txn_map: HashMap<TxnId, Arc<RwLock<Transaction>>>,
}

/// Drives transaction lifecycle against the lock manager and the storage
/// collaborators.
///
/// `begin` hands out transaction handles and registers them in a
/// process-global map; `commit` releases locks and marks the transaction
/// committed; `abort` replays the write set newest-to-oldest, compensating
/// each mutation against the heap and every secondary index before releasing
/// locks.
///
/// All three operations run under the manager's own latch. Terminal
/// transactions stay in the map, which doubles as an audit trail.
pub struct TransactionManager<C: Catalog> {
    lock_manager: Arc<LockManager>,
    catalog: Arc<C>,
    latch: Mutex<TxnRegistry>,
}

impl<C: Catalog> TransactionManager<C> {
    /// Creates a transaction manager over the given lock manager and
    /// catalog.
    pub fn new(lock_manager: Arc<LockManager>, catalog: Arc<C>) -> Self {
        Self {
            lock_manager,
            catalog,
            latch: Mutex::new(TxnRegistry {
                next_txn_id: 0,
                txn_map: HashMap::new(),
            }),
        }
    }

    /// Returns the lock manager this transaction manager releases through.
    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    /// Begins a transaction.
    ///
    /// With `None`, allocates a fresh transaction under the next monotonic
    /// id; with `Some`, (re-)registers the given one. Either way the
    /// transaction lands in the global map and its handle is returned. The
    /// state stays `Default` until the first lock acquisition.
    pub fn begin<L: LogManager>(
        &self,
        txn: Option<Arc<RwLock<Transaction>>>,
        _log_manager: &L,
    ) -> Arc<RwLock<Transaction>> {
        let mut registry = self.latch.lock();
        let txn = match txn {
            Some(txn) => txn,
            None => {
                let id = TxnId(registry.next_txn_id);
                registry.next_txn_id += 1;
                Arc::new(RwLock::new(Transaction::new(id)))
            }
        };
        let id = txn.read().id;
        registry.txn_map.insert(id, Arc::clone(&txn));
        debug!(txn_id = ?id, "transaction registered");
        txn
    }

    /// Looks up a transaction by id, terminal ones included.
    pub fn txn(&self, id: TxnId) -> Option<Arc<RwLock<Transaction>>> {
        self.latch.lock().txn_map.get(&id).map(Arc::clone)
    }

    /// Commits a transaction: drop the write log, release every lock, flush
    /// the log manager, and mark the transaction committed.
    pub fn commit<L: LogManager>(
        &self,
        txn: &mut Transaction,
        log_manager: &L,
    ) -> Result<(), TxnError> {
        let _registry = self.latch.lock();

        txn.write_set.clear();
        self.release_all(txn);
        log_manager.flush(txn.id)?;
        txn.state = TransactionState::Committed;
        debug!(txn_id = ?txn.id, "transaction committed");
        Ok(())
    }

    /// Aborts a transaction: undo the write set newest-to-oldest against the
    /// heap and secondary indexes, release every lock, flush the log
    /// manager, and mark the transaction aborted.
    pub fn abort<L: LogManager>(
        &self,
        txn: &mut Transaction,
        log_manager: &L,
    ) -> Result<(), TxnError> {
        let _registry = self.latch.lock();
        debug!(txn_id = ?txn.id, writes = txn.write_set.len(), "aborting transaction");

        while let Some(write) = txn.write_set.pop() {
            self.undo_write(txn.id, &write)?;
        }
        self.release_all(txn);
        log_manager.flush(txn.id)?;
        txn.state = TransactionState::Aborted;
        Ok(())
    }

    /// Releases every lock in the transaction's lock set, then clears the
    /// set.
    fn release_all(&self, txn: &mut Transaction) {
        let locks: Vec<LockDataId> = txn.lock_set.iter().copied().collect();
        for lock in locks {
            self.lock_manager.unlock(txn, lock);
        }
        txn.lock_set.clear();
    }

    /// Applies the inverse of one recorded mutation.
    fn undo_write(&self, txn_id: TxnId, write: &WriteRecord) -> Result<(), TxnError> {
        match write {
            WriteRecord::Insert { table, rid } => {
                let meta = self.catalog.table(table)?;
                let records = self.catalog.records(table)?;
                let record = records.get_record(*rid, txn_id)?;
                for index in &meta.indexes {
                    let handle = self.catalog.index(table, &index.column_names())?;
                    let key = index.key_from_record(record.as_bytes());
                    handle.delete_entry(&key, txn_id)?;
                }
                records.delete_record(*rid, txn_id)?;
            }
            WriteRecord::Delete { table, record } => {
                let meta = self.catalog.table(table)?;
                let records = self.catalog.records(table)?;
                // The pre-image goes back under a fresh rid.
                let rid = records.insert_record(record.as_bytes(), txn_id)?;
                for index in &meta.indexes {
                    let handle = self.catalog.index(table, &index.column_names())?;
                    let key = index.key_from_record(record.as_bytes());
                    handle.insert_entry(&key, rid, txn_id)?;
                }
            }
            WriteRecord::Update {
                table,
                rid,
                old_record,
            } => {
                let meta = self.catalog.table(table)?;
                let records = self.catalog.records(table)?;
                let current = records.get_record(*rid, txn_id)?;
                for index in &meta.indexes {
                    let handle = self.catalog.index(table, &index.column_names())?;
                    let key = index.key_from_record(current.as_bytes());
                    handle.delete_entry(&key, txn_id)?;
                }
                for index in &meta.indexes {
                    let handle = self.catalog.index(table, &index.column_names())?;
                    let key = index.key_from_record(old_record.as_bytes());
                    handle.insert_entry(&key, *rid, txn_id)?;
                }
                records.update_record(*rid, old_record.as_bytes(), txn_id)?;
            }
        }
        Ok(())
    }
}

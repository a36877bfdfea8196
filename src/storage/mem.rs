// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! In-memory reference implementations of the storage seams.
//!
//! These back the crate's tests and benches and serve as the executable
//! definition of the collaborator contracts. A record file is a slot map
//! with page/slot id allocation; an index is an ordered map from key bytes
//! to record ids.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::txn::TxnId;

use super::{
    Catalog, IndexHandle, IndexMeta, LogManager, Record, RecordId, RecordStore, StorageError,
    TableId, TableMeta,
};

/// Records per page in the in-memory record file.
const SLOTS_PER_PAGE: u32 = 256;

struct MemSlots {
    records: BTreeMap<RecordId, Vec<u8>>,
    next: RecordId,
}

/// In-memory record file with fixed-size records.
///
/// Deleted slots are not reused, so a delete followed by a re-insert of the
/// same bytes yields a fresh record id.
pub struct MemRecordStore {
    record_size: usize,
    slots: RwLock<MemSlots>,
}

impl MemRecordStore {
    /// Creates an empty record file holding records of `record_size` bytes.
    pub fn new(record_size: usize) -> Self {
        Self {
            record_size,
            slots: RwLock::new(MemSlots {
                records: BTreeMap::new(),
                next: RecordId::new(0, 0),
            }),
        }
    }

    /// Returns the number of live records.
    pub fn record_count(&self) -> usize {
        self.slots.read().records.len()
    }

    /// Returns all live records in record-id order.
    pub fn scan(&self) -> Vec<(RecordId, Record)> {
        self.slots
            .read()
            .records
            .iter()
            .map(|(rid, data)| (*rid, Record::new(data.clone())))
            .collect()
    }

    fn check_size(&self, data: &[u8]) -> Result<(), StorageError> {
        if data.len() != self.record_size {
            return Err(StorageError::RecordSizeMismatch {
                len: data.len(),
                expected: self.record_size,
            });
        }
        Ok(())
    }
}

impl RecordStore for MemRecordStore {
    fn get_record(&self, rid: RecordId, _txn: TxnId) -> Result<Record, StorageError> {
        self.slots
            .read()
            .records
            .get(&rid)
            .map(|data| Record::new(data.clone()))
            .ok_or(StorageError::RecordNotFound { rid })
    }

    fn insert_record(&self, data: &[u8], _txn: TxnId) -> Result<RecordId, StorageError> {
        self.check_size(data)?;
        let mut slots = self.slots.write();
        let rid = slots.next;
        slots.next = if rid.slot_no + 1 == SLOTS_PER_PAGE {
            RecordId::new(rid.page_no + 1, 0)
        } else {
            RecordId::new(rid.page_no, rid.slot_no + 1)
        };
        slots.records.insert(rid, data.to_vec());
        Ok(rid)
    }

    fn delete_record(&self, rid: RecordId, _txn: TxnId) -> Result<(), StorageError> {
        self.slots
            .write()
            .records
            .remove(&rid)
            .map(|_| ())
            .ok_or(StorageError::RecordNotFound { rid })
    }

    fn update_record(&self, rid: RecordId, data: &[u8], _txn: TxnId) -> Result<(), StorageError> {
        self.check_size(data)?;
        match self.slots.write().records.get_mut(&rid) {
            Some(slot) => {
                slot.clear();
                slot.extend_from_slice(data);
                Ok(())
            }
            None => Err(StorageError::RecordNotFound { rid }),
        }
    }
}

/// In-memory unique secondary index.
pub struct MemIndex {
    entries: RwLock<BTreeMap<Vec<u8>, RecordId>>,
}

impl MemIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Looks up the record id for `key`.
    pub fn get(&self, key: &[u8]) -> Option<RecordId> {
        self.entries.read().get(key).copied()
    }

    /// Returns the number of entries.
    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }
}

impl Default for MemIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexHandle for MemIndex {
    fn insert_entry(&self, key: &[u8], rid: RecordId, _txn: TxnId) -> Result<(), StorageError> {
        let mut entries = self.entries.write();
        if entries.contains_key(key) {
            return Err(StorageError::DuplicateIndexEntry { key: key.to_vec() });
        }
        entries.insert(key.to_vec(), rid);
        Ok(())
    }

    fn delete_entry(&self, key: &[u8], _txn: TxnId) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

struct MemTable {
    meta: TableMeta,
    records: Arc<MemRecordStore>,
    indexes: Vec<Arc<MemIndex>>,
}

/// In-memory catalog: a registry of tables, their record files, and their
/// index handles.
pub struct MemCatalog {
    tables: RwLock<HashMap<String, MemTable>>,
    next_table_id: RwLock<u32>,
}

impl MemCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            next_table_id: RwLock::new(0),
        }
    }

    /// Registers a table with fixed-size records and the given secondary
    /// indexes, returning its lock handle.
    pub fn create_table(
        &self,
        name: &str,
        record_size: usize,
        indexes: Vec<IndexMeta>,
    ) -> TableId {
        let mut next_id = self.next_table_id.write();
        let id = TableId(*next_id);
        *next_id += 1;

        let index_handles = indexes.iter().map(|_| Arc::new(MemIndex::new())).collect();
        let table = MemTable {
            meta: TableMeta {
                name: name.to_string(),
                id,
                indexes,
            },
            records: Arc::new(MemRecordStore::new(record_size)),
            indexes: index_handles,
        };
        self.tables.write().insert(name.to_string(), table);
        id
    }
}

impl Default for MemCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog for MemCatalog {
    type Records = MemRecordStore;
    type Index = MemIndex;

    fn table(&self, table: &str) -> Result<TableMeta, StorageError> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.meta.clone())
            .ok_or_else(|| StorageError::UnknownTable {
                name: table.to_string(),
            })
    }

    fn records(&self, table: &str) -> Result<Arc<Self::Records>, StorageError> {
        self.tables
            .read()
            .get(table)
            .map(|t| Arc::clone(&t.records))
            .ok_or_else(|| StorageError::UnknownTable {
                name: table.to_string(),
            })
    }

    fn index(&self, table: &str, columns: &[String]) -> Result<Arc<Self::Index>, StorageError> {
        let tables = self.tables.read();
        let t = tables.get(table).ok_or_else(|| StorageError::UnknownTable {
            name: table.to_string(),
        })?;
        t.meta
            .indexes
            .iter()
            .position(|meta| {
                meta.columns
                    .iter()
                    .map(|c| c.name.as_str())
                    .eq(columns.iter().map(|s| s.as_str()))
            })
            .map(|pos| Arc::clone(&t.indexes[pos]))
            .ok_or_else(|| StorageError::UnknownIndex {
                table: table.to_string(),
                columns: columns.to_vec(),
            })
    }
}

/// Log manager that only counts flushes.
///
/// The concurrency core treats the log as a flush point; this implementation
/// makes that call observable.
pub struct MemLogManager {
    flushes: AtomicU64,
}

impl MemLogManager {
    /// Creates a log manager with zero recorded flushes.
    pub fn new() -> Self {
        Self {
            flushes: AtomicU64::new(0),
        }
    }

    /// Returns how many times the core has flushed.
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }
}

impl Default for MemLogManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LogManager for MemLogManager {
    fn flush(&self, _txn: TxnId) -> Result<(), StorageError> {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::IndexColumn;

    const TXN: TxnId = TxnId(1);

    #[test]
    fn test_record_roundtrip() {
        let store = MemRecordStore::new(4);
        let rid = store.insert_record(b"abcd", TXN).unwrap();
        assert_eq!(store.get_record(rid, TXN).unwrap().as_bytes(), b"abcd");

        store.update_record(rid, b"wxyz", TXN).unwrap();
        assert_eq!(store.get_record(rid, TXN).unwrap().as_bytes(), b"wxyz");

        store.delete_record(rid, TXN).unwrap();
        assert!(matches!(
            store.get_record(rid, TXN),
            Err(StorageError::RecordNotFound { .. })
        ));
    }

    #[test]
    fn test_record_size_enforced() {
        let store = MemRecordStore::new(4);
        assert!(matches!(
            store.insert_record(b"toolong", TXN),
            Err(StorageError::RecordSizeMismatch { len: 7, expected: 4 })
        ));
    }

    #[test]
    fn test_rid_allocation_advances_pages() {
        let store = MemRecordStore::new(1);
        let mut last = RecordId::new(0, 0);
        for i in 0..=SLOTS_PER_PAGE {
            last = store.insert_record(&[i as u8], TXN).unwrap();
        }
        assert_eq!(last, RecordId::new(1, 0));
    }

    #[test]
    fn test_deleted_slot_not_reused() {
        let store = MemRecordStore::new(1);
        let rid = store.insert_record(b"a", TXN).unwrap();
        store.delete_record(rid, TXN).unwrap();
        let rid2 = store.insert_record(b"a", TXN).unwrap();
        assert_ne!(rid, rid2);
    }

    #[test]
    fn test_index_unique() {
        let index = MemIndex::new();
        index.insert_entry(b"k", RecordId::new(0, 0), TXN).unwrap();
        assert!(matches!(
            index.insert_entry(b"k", RecordId::new(0, 1), TXN),
            Err(StorageError::DuplicateIndexEntry { .. })
        ));
        index.delete_entry(b"k", TXN).unwrap();
        assert_eq!(index.get(b"k"), None);
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = MemCatalog::new();
        let meta = IndexMeta::new(vec![IndexColumn {
            name: "id".to_string(),
            offset: 0,
            len: 4,
        }]);
        let id = catalog.create_table("users", 8, vec![meta]);

        let table = catalog.table("users").unwrap();
        assert_eq!(table.id, id);
        assert_eq!(table.indexes.len(), 1);

        assert!(catalog.records("users").is_ok());
        assert!(catalog.index("users", &["id".to_string()]).is_ok());
        assert!(matches!(
            catalog.index("users", &["name".to_string()]),
            Err(StorageError::UnknownIndex { .. })
        ));
        assert!(matches!(
            catalog.table("ghosts"),
            Err(StorageError::UnknownTable { .. })
        ));
    }

    #[test]
    fn test_table_ids_unique() {
        let catalog = MemCatalog::new();
        let a = catalog.create_table("a", 1, vec![]);
        let b = catalog.create_table("b", 1, vec![]);
        assert_ne!(a, b);
    }
}

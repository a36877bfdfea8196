// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Lock table data model: lockable resources, lock modes, request queues.

use std::collections::VecDeque;

use crate::storage::{RecordId, TableId};

use super::TxnId;

/// Names one lockable resource: a whole table or a single record.
///
/// Structural equality and hashing make this the key of the global lock
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockDataId {
    /// Table-granularity resource.
    Table(TableId),
    /// Record-granularity resource.
    Record(TableId, RecordId),
}

impl LockDataId {
    /// Creates a table-granularity identifier.
    #[inline]
    pub fn table(table: TableId) -> Self {
        Self::Table(table)
    }

    /// Creates a record-granularity identifier.
    #[inline]
    pub fn record(table: TableId, rid: RecordId) -> Self {
        Self::Record(table, rid)
    }

    /// Returns the table the resource belongs to.
    #[inline]
    pub fn table_id(&self) -> TableId {
        match self {
            Self::Table(table) | Self::Record(table, _) => *table,
        }
    }
}

/// Lock modes grantable to an individual transaction.
///
/// Record-level requests are restricted to [`LockMode::Shared`] and
/// [`LockMode::Exclusive`]; the intention modes exist only at table
/// granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// IS: finer-grained shared locks will be taken on rows of this table.
    IntentionShared,
    /// IX: finer-grained exclusive locks will be taken on rows of this table.
    IntentionExclusive,
    /// S: read the resource.
    Shared,
    /// SIX: read the whole table while writing some of its rows.
    SharedIntentionExclusive,
    /// X: write the resource.
    Exclusive,
}

/// Summary of the strongest grant currently held on a resource.
///
/// Ordered `None < IS < IX < S < SIX < X` for summary purposes only; this is
/// not the compatibility lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupLockMode {
    /// No lock granted.
    #[default]
    None,
    /// Strongest grant is IS.
    IntentionShared,
    /// Strongest grant is IX.
    IntentionExclusive,
    /// Strongest grant is S.
    Shared,
    /// Strongest grant is SIX.
    SharedIntentionExclusive,
    /// Strongest grant is X.
    Exclusive,
}

/// One transaction's interest in a resource.
#[derive(Debug, Clone, Copy)]
pub struct LockRequest {
    pub(crate) txn_id: TxnId,
    pub(crate) mode: LockMode,
    pub(crate) granted: bool,
}

impl LockRequest {
    pub(crate) fn new(txn_id: TxnId, mode: LockMode) -> Self {
        Self {
            txn_id,
            mode,
            granted: false,
        }
    }

    /// Returns the requesting transaction's id.
    #[inline]
    pub fn txn_id(&self) -> TxnId {
        self.txn_id
    }

    /// Returns the requested mode.
    #[inline]
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Returns true if the request has been granted.
    #[inline]
    pub fn granted(&self) -> bool {
        self.granted
    }
}

/// The set of requests on one resource, in insertion order, plus the group
/// mode and the counters that gate upgrades.
#[derive(Debug, Default)]
pub(crate) struct LockRequestQueue {
    pub(crate) requests: VecDeque<LockRequest>,
    pub(crate) group_mode: GroupLockMode,
    pub(crate) shared_count: usize,
    pub(crate) ix_count: usize,
}

/// Point-in-time snapshot of one resource's queue, for introspection and
/// tests.
#[derive(Debug, Clone)]
pub struct QueueState {
    /// Group mode at the time of the snapshot.
    pub group_mode: GroupLockMode,
    /// Requests in insertion order.
    pub requests: Vec<LockRequest>,
    /// Number of granted S holders (SIX counts as S).
    pub shared_count: usize,
    /// Number of granted IX holders (SIX counts as IX).
    pub ix_count: usize,
}

impl LockRequestQueue {
    pub(crate) fn snapshot(&self) -> QueueState {
        QueueState {
            group_mode: self.group_mode,
            requests: self.requests.iter().copied().collect(),
            shared_count: self.shared_count,
            ix_count: self.ix_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_data_id_structural_equality() {
        use std::collections::HashSet;

        let table = TableId(3);
        let rid = RecordId::new(1, 2);

        let mut set = HashSet::new();
        set.insert(LockDataId::table(table));
        set.insert(LockDataId::record(table, rid));

        assert!(set.contains(&LockDataId::Table(TableId(3))));
        assert!(set.contains(&LockDataId::Record(TableId(3), RecordId::new(1, 2))));
        assert!(!set.contains(&LockDataId::Record(TableId(3), RecordId::new(1, 3))));
        assert_ne!(LockDataId::table(table), LockDataId::record(table, rid));
    }

    #[test]
    fn test_lock_data_id_table_id() {
        let id = LockDataId::record(TableId(7), RecordId::new(0, 0));
        assert_eq!(id.table_id(), TableId(7));
        assert_eq!(LockDataId::table(TableId(7)).table_id(), TableId(7));
    }

    #[test]
    fn test_group_mode_defaults_to_none() {
        let queue = LockRequestQueue::default();
        assert_eq!(queue.group_mode, GroupLockMode::None);
        assert_eq!(queue.shared_count, 0);
        assert_eq!(queue.ix_count, 0);
        assert!(queue.requests.is_empty());
    }
}

// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction types and state management.

use std::collections::HashSet;

use crate::storage::{Record, RecordId};

use super::lock::LockDataId;

/// Unique transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxnId(pub u64);

/// Transaction state.
///
/// `Default` lasts until the first lock acquisition enters the growing
/// phase; the first release enters the shrinking phase; commit and abort are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// Created, no lock acquired yet.
    #[default]
    Default,
    /// Acquiring locks (2PL growing phase).
    Growing,
    /// Released at least one lock; no further acquires permitted.
    Shrinking,
    /// Terminal: committed.
    Committed,
    /// Terminal: aborted.
    Aborted,
}

/// One recorded mutation, carrying what rollback needs to undo it.
#[derive(Debug, Clone)]
pub enum WriteRecord {
    /// A record was inserted at `rid`.
    Insert {
        /// Table the record was inserted into.
        table: String,
        /// Where it landed.
        rid: RecordId,
    },
    /// A record was deleted; `record` is its pre-image.
    Delete {
        /// Table the record was deleted from.
        table: String,
        /// Bytes of the deleted record.
        record: Record,
    },
    /// A record was overwritten in place; `old_record` is its pre-image.
    Update {
        /// Table the record lives in.
        table: String,
        /// The overwritten slot.
        rid: RecordId,
        /// Bytes before the update.
        old_record: Record,
    },
}

/// A transaction: id, 2PL state, held locks, and the ordered write log that
/// drives rollback.
///
/// The lock manager mutates `state` and the lock set under the lock-table
/// latch; everything else is driven through the transaction manager. A
/// transaction handle is not meant to be driven from two threads at once.
#[derive(Debug)]
pub struct Transaction {
    pub(crate) id: TxnId,
    pub(crate) state: TransactionState,
    pub(crate) lock_set: HashSet<LockDataId>,
    pub(crate) write_set: Vec<WriteRecord>,
}

impl Transaction {
    /// Creates a transaction in the `Default` state.
    pub fn new(id: TxnId) -> Self {
        Self {
            id,
            state: TransactionState::default(),
            lock_set: HashSet::new(),
            write_set: Vec::new(),
        }
    }

    /// Returns the transaction id.
    #[inline]
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Returns the current state.
    #[inline]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns the resources this transaction currently holds locks on.
    #[inline]
    pub fn lock_set(&self) -> &HashSet<LockDataId> {
        &self.lock_set
    }

    /// Returns the recorded mutations, oldest first.
    #[inline]
    pub fn write_set(&self) -> &[WriteRecord] {
        &self.write_set
    }

    /// Appends a mutation to the write log.
    ///
    /// Callers record every heap mutation here so that abort can replay the
    /// log in reverse.
    pub fn append_write(&mut self, write: WriteRecord) {
        self.write_set.push(write);
    }

    /// Returns true if the transaction has committed.
    #[inline]
    pub fn is_committed(&self) -> bool {
        self.state == TransactionState::Committed
    }

    /// Returns true if the transaction has aborted.
    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.state == TransactionState::Aborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transaction() {
        let txn = Transaction::new(TxnId(7));
        assert_eq!(txn.id(), TxnId(7));
        assert_eq!(txn.state(), TransactionState::Default);
        assert!(txn.lock_set().is_empty());
        assert!(txn.write_set().is_empty());
        assert!(!txn.is_committed());
        assert!(!txn.is_aborted());
    }

    #[test]
    fn test_write_set_preserves_order() {
        let mut txn = Transaction::new(TxnId(1));
        txn.append_write(WriteRecord::Insert {
            table: "t".to_string(),
            rid: RecordId::new(0, 0),
        });
        txn.append_write(WriteRecord::Delete {
            table: "t".to_string(),
            record: Record::from(&b"x"[..]),
        });

        assert_eq!(txn.write_set().len(), 2);
        assert!(matches!(txn.write_set()[0], WriteRecord::Insert { .. }));
        assert!(matches!(txn.write_set()[1], WriteRecord::Delete { .. }));
    }
}

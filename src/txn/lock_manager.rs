// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Multi-granularity two-phase locking with no-wait deadlock prevention.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::storage::{RecordId, TableId};

use super::error::TxnError;
use super::lock::{GroupLockMode, LockDataId, LockMode, LockRequest, LockRequestQueue, QueueState};
use super::transaction::{Transaction, TransactionState};

/// Global lock manager implementing multi-granularity two-phase locking.
///
/// Tables take any of IS/IX/S/SIX/X; records take only S/X, with intent
/// announced at the table level first. Every acquire and release runs to
/// completion under a single process-wide mutex (the latch), so grants are a
/// sequence of atomic decisions. An incompatible request never blocks: it
/// fails with a deadlock-prevention abort condition (no-wait), which the
/// caller must answer by aborting the transaction.
///
/// Queues are created on first reference and never removed; the table's
/// footprint is bounded by the working set of locked resources.
pub struct LockManager {
    latch: Mutex<HashMap<LockDataId, LockRequestQueue>>,
}

impl LockManager {
    /// Creates a lock manager with an empty lock table.
    pub fn new() -> Self {
        Self {
            latch: Mutex::new(HashMap::new()),
        }
    }

    /// Acquires an S lock on one record.
    ///
    /// Returns `Ok(false)` if the transaction is already terminal.
    pub fn lock_shared_on_record(
        &self,
        txn: &mut Transaction,
        rid: RecordId,
        table: TableId,
    ) -> Result<bool, TxnError> {
        let mut lock_table = self.latch.lock();
        if !Self::enter_growing(txn)? {
            return Ok(false);
        }
        let id = LockDataId::record(table, rid);
        let queue = lock_table.entry(id).or_default();

        // Any prior request by this transaction is at least S.
        if queue.requests.iter().any(|r| r.txn_id == txn.id) {
            return Ok(true);
        }

        // Record queues never carry IX/SIX grants in this protocol; the
        // check keeps the rule aligned with the table-level one anyway.
        if matches!(
            queue.group_mode,
            GroupLockMode::IntentionExclusive
                | GroupLockMode::Exclusive
                | GroupLockMode::SharedIntentionExclusive
        ) {
            return Err(Self::refuse(txn, id));
        }

        queue.group_mode = GroupLockMode::Shared;
        queue.shared_count += 1;
        Self::grant(queue, txn, id, LockMode::Shared);
        Ok(true)
    }

    /// Acquires an X lock on one record.
    ///
    /// An existing S grant upgrades in place when this transaction is the
    /// only one in the queue. Returns `Ok(false)` if the transaction is
    /// already terminal.
    pub fn lock_exclusive_on_record(
        &self,
        txn: &mut Transaction,
        rid: RecordId,
        table: TableId,
    ) -> Result<bool, TxnError> {
        let mut lock_table = self.latch.lock();
        if !Self::enter_growing(txn)? {
            return Ok(false);
        }
        let id = LockDataId::record(table, rid);
        let queue = lock_table.entry(id).or_default();

        if let Some(pos) = queue.requests.iter().position(|r| r.txn_id == txn.id) {
            let alone = queue.requests.len() == 1;
            let mode = queue.requests[pos].mode;
            return match mode {
                LockMode::Exclusive => Ok(true),
                LockMode::Shared if alone => {
                    queue.requests[pos].mode = LockMode::Exclusive;
                    queue.group_mode = GroupLockMode::Exclusive;
                    // The upgraded request no longer counts as an S holder.
                    queue.shared_count -= 1;
                    Ok(true)
                }
                _ => Err(Self::refuse(txn, id)),
            };
        }

        if queue.group_mode != GroupLockMode::None {
            return Err(Self::refuse(txn, id));
        }

        queue.group_mode = GroupLockMode::Exclusive;
        Self::grant(queue, txn, id, LockMode::Exclusive);
        Ok(true)
    }

    /// Acquires an S lock on a whole table.
    ///
    /// An existing IS grant upgrades to S while no other transaction holds a
    /// write-side lock; an existing IX grant upgrades to SIX while this
    /// transaction is the only IX holder. Returns `Ok(false)` if the
    /// transaction is already terminal.
    pub fn lock_shared_on_table(
        &self,
        txn: &mut Transaction,
        table: TableId,
    ) -> Result<bool, TxnError> {
        let mut lock_table = self.latch.lock();
        if !Self::enter_growing(txn)? {
            return Ok(false);
        }
        let id = LockDataId::table(table);
        let queue = lock_table.entry(id).or_default();

        if let Some(pos) = queue.requests.iter().position(|r| r.txn_id == txn.id) {
            let mode = queue.requests[pos].mode;
            return match mode {
                LockMode::Shared | LockMode::Exclusive | LockMode::SharedIntentionExclusive => {
                    Ok(true)
                }
                LockMode::IntentionShared
                    if matches!(
                        queue.group_mode,
                        GroupLockMode::Shared | GroupLockMode::IntentionShared
                    ) =>
                {
                    queue.requests[pos].mode = LockMode::Shared;
                    queue.group_mode = GroupLockMode::Shared;
                    queue.shared_count += 1;
                    Ok(true)
                }
                LockMode::IntentionExclusive if queue.ix_count == 1 => {
                    queue.requests[pos].mode = LockMode::SharedIntentionExclusive;
                    queue.group_mode = GroupLockMode::SharedIntentionExclusive;
                    queue.shared_count += 1;
                    Ok(true)
                }
                _ => Err(Self::refuse(txn, id)),
            };
        }

        if matches!(
            queue.group_mode,
            GroupLockMode::IntentionExclusive
                | GroupLockMode::Exclusive
                | GroupLockMode::SharedIntentionExclusive
        ) {
            return Err(Self::refuse(txn, id));
        }

        queue.group_mode = GroupLockMode::Shared;
        queue.shared_count += 1;
        Self::grant(queue, txn, id, LockMode::Shared);
        Ok(true)
    }

    /// Acquires an X lock on a whole table.
    ///
    /// Any existing grant upgrades in place when this transaction is the
    /// only one in the queue. Returns `Ok(false)` if the transaction is
    /// already terminal.
    pub fn lock_exclusive_on_table(
        &self,
        txn: &mut Transaction,
        table: TableId,
    ) -> Result<bool, TxnError> {
        let mut lock_table = self.latch.lock();
        if !Self::enter_growing(txn)? {
            return Ok(false);
        }
        let id = LockDataId::table(table);
        let queue = lock_table.entry(id).or_default();

        if let Some(pos) = queue.requests.iter().position(|r| r.txn_id == txn.id) {
            if queue.requests[pos].mode == LockMode::Exclusive {
                return Ok(true);
            }
            if queue.requests.len() == 1 {
                // The upgraded request sheds whatever it counted as before.
                let mode = queue.requests[pos].mode;
                match mode {
                    LockMode::Shared => queue.shared_count -= 1,
                    LockMode::IntentionExclusive => queue.ix_count -= 1,
                    LockMode::SharedIntentionExclusive => {
                        queue.shared_count -= 1;
                        queue.ix_count -= 1;
                    }
                    LockMode::IntentionShared | LockMode::Exclusive => {}
                }
                queue.requests[pos].mode = LockMode::Exclusive;
                queue.group_mode = GroupLockMode::Exclusive;
                return Ok(true);
            }
            return Err(Self::refuse(txn, id));
        }

        if queue.group_mode != GroupLockMode::None {
            return Err(Self::refuse(txn, id));
        }

        queue.group_mode = GroupLockMode::Exclusive;
        Self::grant(queue, txn, id, LockMode::Exclusive);
        Ok(true)
    }

    /// Acquires an IS lock on a table.
    ///
    /// IS is compatible with everything but X, and any existing grant by
    /// this transaction already covers it. Returns `Ok(false)` if the
    /// transaction is already terminal.
    pub fn lock_intention_shared_on_table(
        &self,
        txn: &mut Transaction,
        table: TableId,
    ) -> Result<bool, TxnError> {
        let mut lock_table = self.latch.lock();
        if !Self::enter_growing(txn)? {
            return Ok(false);
        }
        let id = LockDataId::table(table);
        let queue = lock_table.entry(id).or_default();

        if queue.requests.iter().any(|r| r.txn_id == txn.id) {
            return Ok(true);
        }

        if queue.group_mode == GroupLockMode::Exclusive {
            return Err(Self::refuse(txn, id));
        }
        if queue.group_mode == GroupLockMode::None {
            queue.group_mode = GroupLockMode::IntentionShared;
        }

        Self::grant(queue, txn, id, LockMode::IntentionShared);
        Ok(true)
    }

    /// Acquires an IX lock on a table.
    ///
    /// An existing IS grant upgrades to IX while the group mode stays on the
    /// intention side; an existing S grant upgrades to SIX while this
    /// transaction is the only S holder. Returns `Ok(false)` if the
    /// transaction is already terminal.
    pub fn lock_intention_exclusive_on_table(
        &self,
        txn: &mut Transaction,
        table: TableId,
    ) -> Result<bool, TxnError> {
        let mut lock_table = self.latch.lock();
        if !Self::enter_growing(txn)? {
            return Ok(false);
        }
        let id = LockDataId::table(table);
        let queue = lock_table.entry(id).or_default();

        if let Some(pos) = queue.requests.iter().position(|r| r.txn_id == txn.id) {
            let mode = queue.requests[pos].mode;
            return match mode {
                LockMode::IntentionExclusive
                | LockMode::Exclusive
                | LockMode::SharedIntentionExclusive => Ok(true),
                LockMode::IntentionShared
                    if matches!(
                        queue.group_mode,
                        GroupLockMode::IntentionShared | GroupLockMode::IntentionExclusive
                    ) =>
                {
                    queue.requests[pos].mode = LockMode::IntentionExclusive;
                    queue.group_mode = GroupLockMode::IntentionExclusive;
                    queue.ix_count += 1;
                    Ok(true)
                }
                LockMode::Shared if queue.shared_count == 1 => {
                    queue.requests[pos].mode = LockMode::SharedIntentionExclusive;
                    queue.group_mode = GroupLockMode::SharedIntentionExclusive;
                    queue.ix_count += 1;
                    Ok(true)
                }
                _ => Err(Self::refuse(txn, id)),
            };
        }

        if matches!(
            queue.group_mode,
            GroupLockMode::Shared | GroupLockMode::Exclusive | GroupLockMode::SharedIntentionExclusive
        ) {
            return Err(Self::refuse(txn, id));
        }

        queue.group_mode = GroupLockMode::IntentionExclusive;
        queue.ix_count += 1;
        Self::grant(queue, txn, id, LockMode::IntentionExclusive);
        Ok(true)
    }

    /// Releases this transaction's lock on one resource.
    ///
    /// The first release moves a growing transaction into the shrinking
    /// phase. Releasing a resource that is absent from the lock table, or
    /// one this transaction holds no request on, succeeds as a no-op.
    /// Returns `false` only for terminal transactions.
    pub fn unlock(&self, txn: &mut Transaction, id: LockDataId) -> bool {
        let mut lock_table = self.latch.lock();
        match txn.state {
            TransactionState::Default | TransactionState::Shrinking => {}
            TransactionState::Growing => txn.state = TransactionState::Shrinking,
            TransactionState::Committed | TransactionState::Aborted => return false,
        }

        let Some(queue) = lock_table.get_mut(&id) else {
            return true;
        };
        let Some(pos) = queue.requests.iter().position(|r| r.txn_id == txn.id) else {
            return true;
        };

        let mode = queue.requests[pos].mode;
        match mode {
            LockMode::Shared => queue.shared_count -= 1,
            LockMode::IntentionExclusive => queue.ix_count -= 1,
            LockMode::SharedIntentionExclusive => {
                queue.shared_count -= 1;
                queue.ix_count -= 1;
            }
            LockMode::IntentionShared | LockMode::Exclusive => {}
        }
        queue.requests.remove(pos);

        // Re-derive the group mode from what remains; the scan is
        // authoritative.
        let mut shared = 0;
        let mut exclusive = 0;
        let mut intention_shared = 0;
        let mut intention_exclusive = 0;
        let mut shared_intention_exclusive = 0;
        for request in &queue.requests {
            match request.mode {
                LockMode::Shared => shared += 1,
                LockMode::Exclusive => exclusive += 1,
                LockMode::IntentionShared => intention_shared += 1,
                LockMode::IntentionExclusive => intention_exclusive += 1,
                LockMode::SharedIntentionExclusive => shared_intention_exclusive += 1,
            }
        }
        queue.group_mode = if exclusive > 0 {
            GroupLockMode::Exclusive
        } else if shared_intention_exclusive > 0 {
            GroupLockMode::SharedIntentionExclusive
        } else if shared > 0 {
            GroupLockMode::Shared
        } else if intention_exclusive > 0 {
            GroupLockMode::IntentionExclusive
        } else if intention_shared > 0 {
            GroupLockMode::IntentionShared
        } else {
            GroupLockMode::None
        };
        true
    }

    /// Returns a snapshot of one resource's queue, or `None` if the resource
    /// has never been locked.
    pub fn queue_state(&self, id: LockDataId) -> Option<QueueState> {
        self.latch.lock().get(&id).map(|queue| queue.snapshot())
    }

    /// State gate shared by every acquire: enter or stay in the growing
    /// phase, fail terminal transactions, reject acquires while shrinking.
    fn enter_growing(txn: &mut Transaction) -> Result<bool, TxnError> {
        match txn.state {
            TransactionState::Default => {
                txn.state = TransactionState::Growing;
                Ok(true)
            }
            TransactionState::Growing => Ok(true),
            TransactionState::Committed | TransactionState::Aborted => Ok(false),
            TransactionState::Shrinking => Err(TxnError::LockOnShrinking { txn_id: txn.id }),
        }
    }

    fn grant(queue: &mut LockRequestQueue, txn: &mut Transaction, id: LockDataId, mode: LockMode) {
        let mut request = LockRequest::new(txn.id, mode);
        request.granted = true;
        queue.requests.push_back(request);
        txn.lock_set.insert(id);
    }

    fn refuse(txn: &Transaction, id: LockDataId) -> TxnError {
        debug!(txn_id = ?txn.id, resource = ?id, "lock request refused under no-wait");
        TxnError::DeadlockPrevention { txn_id: txn.id }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

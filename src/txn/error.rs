// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction error types.

use crate::storage::StorageError;

use super::TxnId;

/// Errors that can occur in transaction operations.
///
/// [`TxnError::LockOnShrinking`] and [`TxnError::DeadlockPrevention`] are
/// abort conditions: the caller must abort the transaction through the
/// transaction manager and retry from the top.
#[derive(Debug, thiserror::Error)]
pub enum TxnError {
    #[error("transaction {txn_id:?} acquired a lock in the shrinking phase")]
    LockOnShrinking { txn_id: TxnId },

    #[error("transaction {txn_id:?} must abort to prevent deadlock")]
    DeadlockPrevention { txn_id: TxnId },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Benchmarks for transaction operations.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bariumdb::storage::{
    Catalog, IndexColumn, IndexHandle, IndexMeta, MemCatalog, MemLogManager, RecordStore,
};
use bariumdb::txn::{LockDataId, LockManager, Transaction, TransactionManager, WriteRecord};

const TABLE: &str = "bench";

fn create_test_manager() -> (
    TransactionManager<MemCatalog>,
    Arc<MemCatalog>,
    Arc<LockManager>,
    MemLogManager,
) {
    let catalog = Arc::new(MemCatalog::new());
    catalog.create_table(
        TABLE,
        8,
        vec![IndexMeta::new(vec![IndexColumn {
            name: "id".to_string(),
            offset: 0,
            len: 4,
        }])],
    );
    let lock_manager = Arc::new(LockManager::new());
    let manager = TransactionManager::new(Arc::clone(&lock_manager), Arc::clone(&catalog));
    (manager, catalog, lock_manager, MemLogManager::new())
}

/// Inserts a uniquely-keyed row under IX + X locks and records it in the
/// write set.
fn insert_row(
    catalog: &MemCatalog,
    lock_manager: &LockManager,
    txn: &mut Transaction,
    unique: u32,
) {
    let meta = catalog.table(TABLE).unwrap();
    lock_manager
        .lock_intention_exclusive_on_table(txn, meta.id)
        .unwrap();
    let mut bytes = [0u8; 8];
    bytes[..4].copy_from_slice(&unique.to_le_bytes());
    let rid = catalog
        .records(TABLE)
        .unwrap()
        .insert_record(&bytes, txn.id())
        .unwrap();
    lock_manager
        .lock_exclusive_on_record(txn, rid, meta.id)
        .unwrap();
    catalog
        .index(TABLE, &["id".to_string()])
        .unwrap()
        .insert_entry(&bytes[..4], rid, txn.id())
        .unwrap();
    txn.append_write(WriteRecord::Insert {
        table: TABLE.to_string(),
        rid,
    });
}

fn bench_begin(c: &mut Criterion) {
    let (manager, _catalog, _lock_manager, log) = create_test_manager();

    c.bench_function("txn::begin", |b| {
        b.iter(|| {
            let txn = manager.begin(None, &log);
            black_box(txn)
        })
    });
}

fn bench_lock_unlock_record(c: &mut Criterion) {
    let (manager, catalog, lock_manager, log) = create_test_manager();
    let table_id = catalog.table(TABLE).unwrap().id;

    c.bench_function("txn::lock_unlock_record", |b| {
        b.iter_batched(
            || manager.begin(None, &log),
            |txn| {
                let mut guard = txn.write();
                let rid = bariumdb::storage::RecordId::new(0, 0);
                lock_manager
                    .lock_shared_on_record(&mut guard, rid, table_id)
                    .unwrap();
                lock_manager.unlock(&mut guard, LockDataId::record(table_id, rid));
                black_box(guard.id())
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_commit(c: &mut Criterion) {
    let (manager, catalog, lock_manager, log) = create_test_manager();
    let counter = AtomicU32::new(0);

    c.bench_function("txn::commit", |b| {
        b.iter_batched(
            || {
                let unique = counter.fetch_add(1, Ordering::Relaxed);
                let txn = manager.begin(None, &log);
                insert_row(&catalog, &lock_manager, &mut txn.write(), unique);
                txn
            },
            |txn| manager.commit(&mut *txn.write(), &log).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

fn bench_abort_rollback(c: &mut Criterion) {
    let (manager, catalog, lock_manager, log) = create_test_manager();
    let counter = AtomicU32::new(0);

    c.bench_function("txn::abort_rollback", |b| {
        b.iter_batched(
            || {
                let unique = counter.fetch_add(1, Ordering::Relaxed);
                let txn = manager.begin(None, &log);
                insert_row(&catalog, &lock_manager, &mut txn.write(), unique);
                txn
            },
            |txn| manager.abort(&mut *txn.write(), &log).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_begin,
    bench_lock_unlock_record,
    bench_commit,
    bench_abort_rollback
);
criterion_main!(benches);

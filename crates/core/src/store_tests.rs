// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::entity::{Account, Transaction, TxType};

fn store() -> LocalStore {
    LocalStore::new(Arc::new(Database::open_in_memory().unwrap()))
}

fn account(id: Identity, name: &str) -> Record {
    Record::new(
        id,
        SyncStatus::Synced,
        Entity::Account(Account {
            name: name.to_string(),
            account_type: "checking".to_string(),
            balance: 0.0,
            icon: None,
            color: None,
        }),
    )
}

fn transaction(id: Identity, account_id: &str) -> Record {
    Record::new(
        id,
        SyncStatus::Pending,
        Entity::Transaction(Transaction {
            account_id: Some(account_id.to_string()),
            category_id: None,
            amount: 12.5,
            tx_date: None,
            description: None,
            tx_type: TxType::Expense,
            is_recurring: false,
            tags: vec![],
        }),
    )
}

fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| match &r.entity {
            Entity::Account(a) => a.name.clone(),
            _ => String::new(),
        })
        .collect()
}

#[test]
fn put_and_get() {
    let store = store();
    let id = Identity::Remote("a1".into());
    store.put(&account(id.clone(), "Wallet")).unwrap();

    let record = store.get(Collection::Accounts, &id).unwrap().unwrap();
    assert_eq!(record.identity, id);
    assert_eq!(names(&[record]), vec!["Wallet"]);
}

#[test]
fn get_requires_matching_identity_kind() {
    let store = store();
    store
        .put(&account(Identity::Remote("a1".into()), "Wallet"))
        .unwrap();

    let lookup = Identity::Provisional("a1".into());
    assert!(store.get(Collection::Accounts, &lookup).unwrap().is_none());
    assert!(store.resolve(Collection::Accounts, "a1").unwrap().is_some());
}

#[test]
fn scan_preserves_insertion_order_across_overwrites() {
    let store = store();
    store.put(&account(Identity::Remote("b".into()), "First")).unwrap();
    store.put(&account(Identity::Remote("a".into()), "Second")).unwrap();
    // Overwrite keeps the original slot
    store.put(&account(Identity::Remote("b".into()), "First v2")).unwrap();

    let records = store.scan(Collection::Accounts).unwrap();
    assert_eq!(names(&records), vec!["First v2", "Second"]);
}

#[test]
fn scan_where_filters() {
    let store = store();
    store.put(&account(Identity::Remote("a".into()), "A")).unwrap();
    let mut pending = account(Identity::provisional(), "B");
    pending.sync_status = SyncStatus::Pending;
    store.put(&pending).unwrap();

    let only_pending = store
        .scan_where(Collection::Accounts, |r| r.sync_status == SyncStatus::Pending)
        .unwrap();
    assert_eq!(names(&only_pending), vec!["B"]);
}

#[test]
fn bulk_replace_discards_previous_snapshot() {
    let store = store();
    store.put(&account(Identity::Remote("old".into()), "Old")).unwrap();

    store
        .bulk_replace(
            Collection::Accounts,
            &[
                account(Identity::Remote("n1".into()), "New 1"),
                account(Identity::Remote("n2".into()), "New 2"),
            ],
        )
        .unwrap();

    let records = store.scan(Collection::Accounts).unwrap();
    assert_eq!(names(&records), vec!["New 1", "New 2"]);
}

#[test]
fn bulk_replace_rejects_foreign_records_and_keeps_contents() {
    let store = store();
    store.put(&account(Identity::Remote("keep".into()), "Keep")).unwrap();

    let result = store.bulk_replace(
        Collection::Accounts,
        &[
            account(Identity::Remote("n1".into()), "New"),
            transaction(Identity::Remote("t1".into()), "n1"),
        ],
    );
    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert_eq!(names(&store.scan(Collection::Accounts).unwrap()), vec!["Keep"]);
}

#[test]
fn bulk_replace_leaves_other_collections_alone() {
    let store = store();
    store
        .put(&transaction(Identity::Remote("t1".into()), "a1"))
        .unwrap();
    store.bulk_replace(Collection::Accounts, &[]).unwrap();
    assert_eq!(store.scan(Collection::Transactions).unwrap().len(), 1);
}

#[test]
fn delete_reports_presence() {
    let store = store();
    let id = Identity::Remote("a1".into());
    store.put(&account(id.clone(), "Wallet")).unwrap();

    assert!(store.delete(Collection::Accounts, &id).unwrap());
    assert!(!store.delete(Collection::Accounts, &id).unwrap());
}

#[test]
fn set_status_updates_only_status() {
    let store = store();
    let id = Identity::Remote("a1".into());
    store.put(&account(id.clone(), "Wallet")).unwrap();
    store
        .set_status(Collection::Accounts, &id, SyncStatus::Failed)
        .unwrap();

    let record = store.get(Collection::Accounts, &id).unwrap().unwrap();
    assert_eq!(record.sync_status, SyncStatus::Failed);
    assert_eq!(names(&[record]), vec!["Wallet"]);
}

#[test]
fn reconcile_identity_moves_record_and_references() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let store = LocalStore::new(Arc::clone(&db));
    let provisional = Identity::Provisional("local-1".into());
    let mut pending = account(provisional.clone(), "Savings");
    pending.sync_status = SyncStatus::Pending;
    store.put(&pending).unwrap();
    store.put(&account(Identity::Remote("a0".into()), "Later")).unwrap();
    store
        .put(&transaction(Identity::provisional(), "local-1"))
        .unwrap();

    let reconciled = account(Identity::Remote("srv-9".into()), "Savings");
    let migrated = db
        .transaction(|tx| reconcile_identity_in(tx, &provisional, &reconciled))
        .unwrap();
    assert_eq!(migrated, 1);

    assert!(store.get(Collection::Accounts, &provisional).unwrap().is_none());
    let records = store.scan(Collection::Accounts).unwrap();
    assert_eq!(records[0].identity, Identity::Remote("srv-9".into()));
    assert_eq!(records[0].sync_status, SyncStatus::Synced);

    let txs = store.scan(Collection::Transactions).unwrap();
    assert_eq!(txs[0].entity.references(), vec!["srv-9"]);
}

#[test]
fn reconcile_identity_replaces_cached_server_copy() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let store = LocalStore::new(Arc::clone(&db));
    let provisional = Identity::Provisional("local-1".into());
    let mut pending = account(provisional.clone(), "Savings");
    pending.sync_status = SyncStatus::Pending;
    store.put(&pending).unwrap();
    store
        .put(&account(Identity::Remote("srv-9".into()), "Savings (server)"))
        .unwrap();

    let reconciled = account(Identity::Remote("srv-9".into()), "Savings");
    db.transaction(|tx| reconcile_identity_in(tx, &provisional, &reconciled))
        .unwrap();

    let records = store.scan(Collection::Accounts).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].identity, Identity::Remote("srv-9".into()));
    assert_eq!(names(&records), vec!["Savings"]);
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::commands::testing::TestContext;
use crate::commands::write::{apply, parse_entity};
use tally_core::{Identity, Mutation, SyncStatus};
use yare::parameterized;

fn tx(date: Option<&str>, amount: f64, tx_type: &str) -> Record {
    let mut body = serde_json::json!({"amount": amount, "tx_type": tx_type});
    if let Some(date) = date {
        body["tx_date"] = date.into();
    }
    Record::new(
        Identity::Remote(format!("srv-{}", date.unwrap_or("none"))),
        SyncStatus::Synced,
        Entity::from_body(Collection::Transactions, body).unwrap(),
    )
}

#[test]
fn transactions_sort_newest_first() {
    let mut records = vec![
        tx(Some("2026-01-05"), 1.0, "expense"),
        tx(None, 2.0, "expense"),
        tx(Some("2026-03-01"), 3.0, "income"),
    ];
    sort_for_display(Collection::Transactions, &mut records);
    let ids: Vec<_> = records.iter().map(|r| r.identity.as_str()).collect();
    assert_eq!(ids, ["srv-2026-03-01", "srv-2026-01-05", "srv-none"]);
}

#[test]
fn accounts_sort_by_name() {
    let mut records: Vec<Record> = ["savings", "Cash", "brokerage"]
        .iter()
        .map(|name| {
            Record::new(
                Identity::Remote(name.to_string()),
                SyncStatus::Synced,
                parse_entity(
                    Collection::Accounts,
                    &format!(r#"{{"name": "{name}", "account_type": "bank"}}"#),
                )
                .unwrap(),
            )
        })
        .collect();
    sort_for_display(Collection::Accounts, &mut records);
    let names: Vec<_> = records.iter().map(|r| r.identity.as_str()).collect();
    assert_eq!(names, ["brokerage", "Cash", "savings"]);
}

#[parameterized(
    expense = { Some("2026-03-01"), 12.5, "expense", "srv-2026-03-01  [synced]  2026-03-01 -12.50 -" },
    income = { Some("2026-02-01"), 100.0, "income", "srv-2026-02-01  [synced]  2026-02-01 +100.00 -" },
    undated = { None, 4.0, "expense", "srv-none  [synced]  ---------- -4.00 -" },
)]
fn formats_transactions(date: Option<&str>, amount: f64, tx_type: &str, expected: &str) {
    assert_eq!(format_record(&tx(date, amount, tx_type)), expected);
}

#[test]
fn formats_accounts_and_categories() {
    let account = Record::new(
        Identity::Provisional("local-1".to_string()),
        SyncStatus::Pending,
        parse_entity(
            Collection::Accounts,
            r#"{"name": "Wallet", "account_type": "cash", "balance": 20}"#,
        )
        .unwrap(),
    );
    assert_eq!(format_record(&account), "local-1  [pending]  Wallet (cash) 20.00");

    let category = Record::new(
        Identity::Remote("srv-3".to_string()),
        SyncStatus::Failed,
        parse_entity(Collection::Categories, r#"{"name": "Food"}"#).unwrap(),
    );
    assert_eq!(format_record(&category), "srv-3  [failed]  Food");
}

#[tokio::test]
async fn offline_list_serves_cache_as_stale() {
    let ctx = TestContext::new();
    apply(
        &ctx,
        Mutation::Create(
            parse_entity(Collection::Categories, r#"{"name": "Rent"}"#).unwrap(),
        ),
    )
    .await
    .unwrap();

    let outcome = fetch(&ctx, Collection::Categories, &TransactionFilter::default())
        .await
        .unwrap();
    assert!(outcome.stale);
    assert_eq!(outcome.records.len(), 1);

    let json = to_json(&outcome.records).unwrap();
    assert_eq!(json[0]["name"], "Rent");
    assert_eq!(json[0]["sync_status"], "pending");
    assert_eq!(json[0]["identity_kind"], "provisional");
}

#[tokio::test]
async fn offline_filtered_list_narrows_cached_transactions() {
    let ctx = TestContext::new();
    for body in [
        r#"{"amount": 900, "tx_type": "expense", "tx_date": "2026-03-01", "description": "March rent"}"#,
        r#"{"amount": 40, "tx_type": "expense", "tx_date": "2026-03-02", "description": "Groceries"}"#,
        r#"{"amount": 900, "tx_type": "expense", "tx_date": "2026-02-01", "description": "February rent"}"#,
    ] {
        apply(
            &ctx,
            Mutation::Create(parse_entity(Collection::Transactions, body).unwrap()),
        )
        .await
        .unwrap();
    }

    let filter = TransactionFilter {
        start_date: Some("2026-03-01".into()),
        search: Some("RENT".into()),
        ..TransactionFilter::default()
    };
    let outcome = fetch(&ctx, Collection::Transactions, &filter).await.unwrap();
    assert!(outcome.stale);
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(to_json(&outcome.records).unwrap()[0]["description"], "March rent");
}

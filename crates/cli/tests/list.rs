// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

mod common;
use common::*;

#[test]
fn list_empty_collection() {
    let temp = init_temp();

    tally()
        .args(["list", "accounts"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No accounts found"));
}

#[test]
fn list_unknown_collection() {
    let temp = init_temp();

    tally()
        .args(["list", "budgets"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid collection"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn offline_list_shows_queued_records() {
    let temp = init_temp_remote(DEAD_REMOTE);
    let id = create(&temp, "categories", r#"{"name": "Groceries"}"#);
    assert!(id.starts_with("local-"));

    tally()
        .args(["list", "categories"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(&id))
        .stdout(predicate::str::contains("[pending]  Groceries"))
        .stderr(predicate::str::contains("showing cached categories"));
}

#[test]
fn transactions_are_newest_first() {
    let temp = init_temp();
    for (date, desc) in [
        ("2026-01-10", "january"),
        ("2026-03-02", "march"),
        ("2026-02-14", "february"),
    ] {
        create(
            &temp,
            "transactions",
            &format!(r#"{{"amount": 5, "tx_type": "expense", "tx_date": "{date}", "description": "{desc}"}}"#),
        );
    }

    let stdout = stdout_of(&temp, &["list", "transactions"]);
    let order: Vec<&str> = stdout
        .lines()
        .filter_map(|l| l.split_whitespace().last())
        .collect();
    assert_eq!(order, ["march", "february", "january"]);
}

#[test]
fn json_output() {
    let temp = init_temp();
    create(
        &temp,
        "accounts",
        r#"{"name": "Wallet", "account_type": "cash", "balance": 12.5}"#,
    );

    let json = json_of(&temp, &["list", "accounts", "--output", "json"]);
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "Wallet");
    assert_eq!(rows[0]["balance"], 12.5);
    assert_eq!(rows[0]["identity_kind"], "provisional");
    assert_eq!(rows[0]["sync_status"], "pending");
}

#[test]
fn online_list_reads_remote() {
    let server = MockServer::start();
    let checking = json!({"id": "srv-1", "name": "Checking", "account_type": "bank", "balance": 0.0});
    server.mock(|when, then| {
        when.method(POST).path("/accounts");
        then.status(201).json_body(checking.clone());
    });
    let listing = server.mock(|when, then| {
        when.method(GET).path("/accounts");
        then.status(200).json_body(json!([checking]));
    });
    let temp = init_temp_remote(&server.base_url());
    let id = create(&temp, "accounts", r#"{"name": "Checking", "account_type": "bank"}"#);
    assert_eq!(id, "srv-1");

    tally()
        .args(["list", "accounts"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("srv-1  [synced]  Checking (bank) 0.00"))
        .stderr(predicate::str::contains("cached").not());
    listing.assert_hits(1);
}

#[test]
fn transaction_filters_are_sent_to_remote() {
    let server = MockServer::start();
    let filtered = server.mock(|when, then| {
        when.method(GET)
            .path("/transactions")
            .query_param("start_date", "2026-03-01")
            .query_param("search", "rent");
        then.status(200).json_body(json!([{
            "id": "srv-8", "amount": 900, "tx_type": "expense",
            "tx_date": "2026-03-01", "description": "Rent", "tags": null
        }]));
    });
    let temp = init_temp_remote(&server.base_url());

    tally()
        .args(["list", "transactions", "--from", "2026-03-01", "--search", "rent"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("srv-8  [synced]  2026-03-01 -900.00 Rent"));
    filtered.assert_hits(1);
}

#[test]
fn filters_are_rejected_for_other_collections() {
    let temp = init_temp();

    tally()
        .args(["list", "accounts", "--search", "cash"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("filters only apply to transactions"));
}

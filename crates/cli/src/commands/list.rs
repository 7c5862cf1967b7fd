// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::cmp::Reverse;

use serde_json::Value;
use tally_core::{Collection, Entity, ReadOutcome, Record, TransactionFilter, TxType};

use super::{block_on, open, parse_collection, Context};
use crate::cli::OutputFormat;
use crate::error::{Error, Result};

pub fn run(collection: &str, filter: TransactionFilter, output: OutputFormat) -> Result<()> {
    let collection = parse_collection(collection)?;
    if !filter.is_empty() && collection != Collection::Transactions {
        return Err(Error::FilterNotSupported(collection.to_string()));
    }
    let ctx = open()?;
    let outcome = block_on(fetch(&ctx, collection, &filter))??;

    if outcome.stale && ctx.config.remote.is_some() {
        eprintln!("warning: remote unreachable, showing cached {}", collection);
    }

    match output {
        OutputFormat::Text => {
            if outcome.records.is_empty() {
                println!("No {} found", collection);
            }
            for record in &outcome.records {
                println!("{}", format_record(record));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&to_json(&outcome.records)?)?);
        }
    }
    Ok(())
}

/// Probe, read through the engine, and order for display.
pub(crate) async fn fetch(
    ctx: &Context,
    collection: Collection,
    filter: &TransactionFilter,
) -> Result<ReadOutcome> {
    ctx.refresh_connectivity().await;
    let mut outcome = match collection {
        Collection::Transactions => ctx.engine.read_transactions(filter).await?,
        _ => ctx.engine.read(collection).await?,
    };
    sort_for_display(collection, &mut outcome.records);
    Ok(outcome)
}

/// Transactions newest first; everything else by name.
pub(crate) fn sort_for_display(collection: Collection, records: &mut [Record]) {
    match collection {
        Collection::Transactions => records.sort_by_key(|r| match &r.entity {
            Entity::Transaction(t) => Reverse(t.tx_date.clone()),
            _ => Reverse(None),
        }),
        Collection::Accounts | Collection::Categories => {
            records.sort_by_key(|r| name_of(&r.entity).to_lowercase())
        }
    }
}

fn name_of(entity: &Entity) -> &str {
    match entity {
        Entity::Account(a) => &a.name,
        Entity::Category(c) => &c.name,
        Entity::Transaction(t) => t.description.as_deref().unwrap_or_default(),
    }
}

pub(crate) fn format_record(record: &Record) -> String {
    let summary = match &record.entity {
        Entity::Account(a) => format!("{} ({}) {:.2}", a.name, a.account_type, a.balance),
        Entity::Category(c) => match &c.category_type {
            Some(kind) => format!("{} ({})", c.name, kind),
            None => c.name.clone(),
        },
        Entity::Transaction(t) => {
            let sign = match t.tx_type {
                TxType::Income => '+',
                TxType::Expense => '-',
            };
            format!(
                "{} {}{:.2} {}",
                t.tx_date.as_deref().unwrap_or("----------"),
                sign,
                t.amount.abs(),
                t.description.as_deref().unwrap_or("-")
            )
        }
    };
    format!(
        "{}  [{}]  {}",
        record.identity.as_str(),
        record.sync_status,
        summary
    )
}

fn to_json(records: &[Record]) -> Result<Value> {
    let rows = records
        .iter()
        .map(Record::to_json)
        .collect::<tally_core::Result<Vec<_>>>()?;
    Ok(Value::Array(rows))
}

#[cfg(test)]
#[path = "list_tests.rs"]
mod tests;

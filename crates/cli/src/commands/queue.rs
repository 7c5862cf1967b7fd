// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Operation queue inspection and manual recovery.

use serde_json::Value;
use tally_core::QueueEntry;

use super::open;
use crate::cli::OutputFormat;
use crate::error::Result;

pub fn list(output: OutputFormat) -> Result<()> {
    let ctx = open()?;
    print_entries(&ctx.engine.queue().entries()?, output, "Queue is empty")
}

pub fn failed(output: OutputFormat) -> Result<()> {
    let ctx = open()?;
    print_entries(&ctx.engine.failed_entries()?, output, "No failed entries")
}

pub fn retry(sequence: i64) -> Result<()> {
    let ctx = open()?;
    ctx.engine.retry_failed(sequence)?;
    println!("Entry #{} queued for retry", sequence);
    Ok(())
}

pub fn discard(sequence: i64) -> Result<()> {
    let ctx = open()?;
    let entry = ctx.engine.discard(sequence)?;
    println!("Discarded #{}: {} {}", entry.sequence, entry.kind, entry.target);
    Ok(())
}

fn print_entries(entries: &[QueueEntry], output: OutputFormat, empty: &str) -> Result<()> {
    match output {
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("{}", empty);
            }
            for entry in entries {
                println!("{}", format_entry(entry));
            }
        }
        OutputFormat::Json => {
            let rows = entries
                .iter()
                .map(QueueEntry::to_json)
                .collect::<tally_core::Result<Vec<_>>>()?;
            println!("{}", serde_json::to_string_pretty(&Value::Array(rows))?);
        }
    }
    Ok(())
}

pub(crate) fn format_entry(entry: &QueueEntry) -> String {
    let mut line = format!(
        "#{}  {:<6}  {}  {}  attempts {}",
        entry.sequence,
        entry.kind.as_str(),
        entry.target,
        entry.status,
        entry.attempt_count
    );
    if !entry.depends_on.is_empty() {
        line.push_str(&format!("  after {}", entry.depends_on.join(", ")));
    }
    if let Some(error) = &entry.last_error {
        line.push_str(&format!("\n    last error: {}", error));
    }
    line
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

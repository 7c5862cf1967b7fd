// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use serde::Serialize;
use tally_core::CredentialProvider;

use super::{block_on, open, Context};
use crate::cli::OutputFormat;
use crate::credentials::TokenSource;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct StatusReport {
    pub remote: Option<String>,
    pub online: bool,
    pub credential: bool,
    pub pending: usize,
    pub failed: usize,
}

pub fn run(output: OutputFormat) -> Result<()> {
    let ctx = open()?;
    let report = block_on(gather(&ctx))??;
    match output {
        OutputFormat::Text => {
            for line in format_text(&report) {
                println!("{}", line);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

pub(crate) async fn gather(ctx: &Context) -> Result<StatusReport> {
    let online = ctx.refresh_connectivity().await;
    Ok(StatusReport {
        remote: ctx.config.remote_url().map(str::to_string),
        online,
        credential: TokenSource::from_config(ctx.config.remote.as_ref())
            .token()
            .is_some(),
        pending: ctx.engine.pending_count()?,
        failed: ctx.engine.failed_entries()?.len(),
    })
}

pub(crate) fn format_text(report: &StatusReport) -> Vec<String> {
    let mut lines = vec![
        format!("Remote: {}", report.remote.as_deref().unwrap_or("none")),
        format!(
            "Connectivity: {}",
            if report.online { "online" } else { "offline" }
        ),
        format!(
            "Credential: {}",
            if report.credential { "present" } else { "missing" }
        ),
        format!("Pending: {}", report.pending),
        format!("Failed: {}", report.failed),
    ];
    if report.failed > 0 {
        lines.push("  hint: run 'tally queue failed' to inspect, then retry or discard".to_string());
    }
    lines
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;

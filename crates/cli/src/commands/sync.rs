// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queue replay: one drain, or a long-running watch.

use tally_core::{DrainReport, DrainStop};
use tokio_util::sync::CancellationToken;

use super::{block_on, open, Context};
use crate::error::{Error, Result};

pub fn run(watch: bool) -> Result<()> {
    let ctx = open()?;
    if ctx.config.remote.is_none() {
        return Err(Error::NoRemote);
    }

    if watch {
        return block_on(watch_loop(&ctx))?;
    }

    match block_on(drain_once(&ctx))?? {
        Some(report) => {
            let pending = ctx.engine.pending_count()?;
            println!("{}", describe(&report, pending));
        }
        None => println!(
            "Offline: remote unreachable, {} entries pending",
            ctx.engine.pending_count()?
        ),
    }
    Ok(())
}

/// Drain if the remote answers the probe. An unreachable remote is left
/// alone so queued entries keep their attempt budget.
pub(crate) async fn drain_once(ctx: &Context) -> Result<Option<DrainReport>> {
    if !ctx.refresh_connectivity().await {
        return Ok(None);
    }
    Ok(Some(ctx.engine.drain_now().await?))
}

async fn watch_loop(ctx: &Context) -> Result<()> {
    let cancel = CancellationToken::new();
    let interval = ctx.config.drain_interval();
    let _notice = ctx.engine.subscribe_connectivity(|online| {
        println!("{}", if online { "Online" } else { "Offline" });
    });
    let drainer = ctx.engine.spawn_auto_drain(interval, cancel.clone());

    println!(
        "Watching {} (every {}s, ctrl-c to stop)",
        ctx.config.remote_url().unwrap_or_default(),
        interval.as_secs()
    );

    let mut probe = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = probe.tick() => {
                ctx.refresh_connectivity().await;
            }
        }
    }

    cancel.cancel();
    drainer
        .await
        .map_err(|e| Error::Io(std::io::Error::other(format!("drain task: {}", e))))?;
    println!("{} entries pending", ctx.engine.pending_count()?);
    Ok(())
}

pub(crate) fn describe(report: &DrainReport, pending: usize) -> String {
    let mut line = format!(
        "Synced {}, retrying {}, failed {}; {} pending",
        report.synced, report.retrying, report.abandoned, pending
    );
    match report.stopped {
        Some(DrainStop::Offline) => line.push_str(" (stopped: remote unreachable)"),
        Some(DrainStop::NoCredential) => {
            line.push_str(" (stopped: no credential, set the token env var or remote.token)")
        }
        Some(DrainStop::Cancelled) => line.push_str(" (stopped: cancelled)"),
        None => {}
    }
    line
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use clap::Parser;
use tallyrs::{Cli, Command};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

fn main() {
    let cli = Cli::parse();

    // Long-running watches also keep a log next to the cache.
    let log_path = match cli.command {
        Command::Sync { watch: true } => tallyrs::find_work_dir()
            .ok()
            .map(|dir| tallyrs::get_log_path(&dir)),
        _ => None,
    };
    setup_logging(cli.verbose, log_path.as_deref());

    if let Err(e) = tallyrs::run(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn setup_logging(verbose: bool, log_path: Option<&Path>) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let file = log_path
        .and_then(|path| {
            fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        })
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(EnvFilter::new("info"))
        });

    let _ = tracing_subscriber::registry()
        .with(stderr)
        .with(file)
        .try_init();
}

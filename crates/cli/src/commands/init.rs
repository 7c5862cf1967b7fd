// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::{Path, PathBuf};

use tally_core::Database;

use crate::config::{get_db_path, init_work_dir, write_gitignore, Config};
use crate::error::Result;

pub fn run(remote: Option<String>) -> Result<()> {
    let config = Config::new(remote.as_deref())?;
    let work_dir = run_at(&std::env::current_dir()?, &config)?;

    println!("Initialized tally at {}", work_dir.display());
    match config.remote_url() {
        Some(url) => println!("Remote: {}", url),
        None => println!("Remote: none (changes stay queued until one is configured)"),
    }
    Ok(())
}

/// Create `.tally/` under `path` with its config, cache and .gitignore.
pub(crate) fn run_at(path: &Path, config: &Config) -> Result<PathBuf> {
    let work_dir = init_work_dir(path, config)?;
    Database::open(&get_db_path(&work_dir))?;
    write_gitignore(&work_dir)?;
    tracing::debug!("initialized {}", work_dir.display());
    Ok(work_dir)
}

#[cfg(test)]
#[path = "init_tests.rs"]
mod tests;

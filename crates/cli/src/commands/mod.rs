// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod init;
pub mod list;
pub mod queue;
pub mod status;
pub mod sync;
pub mod write;

#[cfg(test)]
#[path = "mod_tests.rs"]
pub mod testing;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tally_core::{Collection, ConnectivityMonitor, Database, SyncEngine};

use crate::config::{find_work_dir, get_db_path, Config};
use crate::credentials::TokenSource;
use crate::error::{Error, Result};
use crate::http::HttpRemote;

pub type Engine = SyncEngine<HttpRemote, TokenSource>;

/// An opened project: config plus an engine over its cache.
pub struct Context {
    pub work_dir: PathBuf,
    pub config: Config,
    pub engine: Arc<Engine>,
}

impl Context {
    /// Open the project whose `.tally/` is at `work_dir`.
    ///
    /// The connectivity monitor starts offline; commands that talk to the
    /// remote call [`Context::refresh_connectivity`] first.
    pub fn open_at(work_dir: &Path) -> Result<Self> {
        let config = Config::load(work_dir)?;
        let db = Arc::new(Database::open(&get_db_path(work_dir))?);
        let remote = HttpRemote::new(config.remote.as_ref())?;
        let credentials = TokenSource::from_config(config.remote.as_ref());
        let connectivity = Arc::new(ConnectivityMonitor::new(false));
        let engine = SyncEngine::new(db, remote, credentials, connectivity, config.engine_config())?;
        Ok(Context {
            work_dir: work_dir.to_path_buf(),
            config,
            engine: Arc::new(engine),
        })
    }

    /// Probe the remote and report the reading to the monitor.
    pub async fn refresh_connectivity(&self) -> bool {
        let online = self.engine.remote().probe().await;
        self.engine.connectivity().set_online(online);
        online
    }
}

/// Helper to open the project from the current directory.
pub fn open() -> Result<Context> {
    Context::open_at(&find_work_dir()?)
}

/// Run `future` to completion on a fresh runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Io(std::io::Error::other(format!("tokio: {}", e))))?;
    Ok(rt.block_on(future))
}

pub fn parse_collection(name: &str) -> Result<Collection> {
    Ok(name.parse::<Collection>()?)
}

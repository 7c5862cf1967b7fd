// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// All possible errors that can occur in the tallyrs library.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not initialized: run 'tally init' first")]
    NotInitialized,

    #[error("already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("record not found: {collection}/{id}\n  hint: run 'tally list {collection}' to see known ids")]
    RecordNotFound { collection: String, id: String },

    #[error("invalid record json: {0}\n  hint: pass a JSON object, e.g. --json '{{\"name\": \"Wallet\"}}'")]
    InvalidJson(String),

    #[error("filters only apply to transactions, not {0}\n  hint: drop --from/--to/--account/--search")]
    FilterNotSupported(String),

    #[error("no remote configured\n  hint: add a [remote] section with a url to .tally/config.toml")]
    NoRemote,

    #[error("invalid remote url '{0}'\n  hint: use an http:// or https:// base url")]
    InvalidRemoteUrl(String),

    #[error("http client error: {0}")]
    Http(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] tally_core::Error),
}

/// A specialized Result type for tallyrs operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

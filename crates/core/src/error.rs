// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for tally-core operations.

use thiserror::Error;

/// All possible errors that can occur in tally-core operations.
///
/// Transient network conditions (`NetworkUnavailable`, `NetworkTimeout`,
/// `RemoteServerError`) are absorbed by the engine's offline path and only
/// reach callers through queue inspection. `RemoteRejected` and
/// `StorageUnavailable` are surfaced directly.
#[derive(Debug, Error)]
pub enum Error {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] rusqlite::Error),

    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("network timeout after {0} ms")]
    NetworkTimeout(u64),

    #[error("remote rejected request ({status}): {message}")]
    RemoteRejected { status: u16, message: String },

    #[error("remote server error ({status}): {message}")]
    RemoteServerError { status: u16, message: String },

    #[error("record not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("queue entry not found: {0}")]
    EntryNotFound(i64),

    #[error("invalid collection: '{0}'\n  hint: valid collections are: accounts, categories, transactions")]
    InvalidCollection(String),

    #[error("invalid transaction type: '{0}'\n  hint: valid types are: income, expense")]
    InvalidTxType(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

impl Error {
    /// True for failures that the offline path absorbs and the drain retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::NetworkUnavailable(_) | Error::NetworkTimeout(_) | Error::RemoteServerError { .. }
        )
    }

    /// True when no response reached us at all (as opposed to a 5xx).
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::NetworkUnavailable(_) | Error::NetworkTimeout(_))
    }
}

/// A specialized Result type for tally-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

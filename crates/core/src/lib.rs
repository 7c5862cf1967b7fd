// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tally-core: offline-first sync engine for personal finance data
//!
//! This crate provides the local cache, the durable operation queue, and the
//! engine that keeps them in step with a remote REST store. The `tally` CLI
//! supplies the HTTP client, credentials, and connectivity signal.

pub mod connectivity;
pub mod db;
pub mod engine;
pub mod entity;
pub mod error;
pub mod queue;
pub mod remote;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use connectivity::{ConnectivityMonitor, Subscription};
pub use db::Database;
pub use engine::{
    DrainReport, DrainStop, EngineConfig, Mutation, ReadOutcome, SyncEngine, WriteOutcome,
};
pub use entity::{
    Account, Category, Collection, Entity, Identity, IdentityKind, Record, SyncStatus,
    Transaction, TransactionFilter, TxType,
};
pub use error::{Error, Result};
pub use queue::{
    EntryStatus, FailOutcome, OperationKind, OperationQueue, QueueEntry, ResourceRef,
};
pub use remote::{
    classify_status, CredentialProvider, Method, RemoteClient, RemoteRequest, RemoteResponse,
    StaticCredential, StatusClass,
};
pub use store::LocalStore;

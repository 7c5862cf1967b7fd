// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Domain records held in the local cache.
//!
//! Every cached record pairs a typed [`Entity`] body with an [`Identity`]
//! that says explicitly whether the id was assigned by the remote store or
//! generated locally before the first successful sync, and with a
//! [`SyncStatus`] describing how far the record is from the remote's view.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Prefix of locally generated ids. Only used when minting; lookups go
/// through [`IdentityKind`].
pub const PROVISIONAL_PREFIX: &str = "local";

static PROVISIONAL_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A named group of records mirrored from one remote resource endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Accounts,
    Categories,
    Transactions,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Accounts,
        Collection::Categories,
        Collection::Transactions,
    ];

    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Accounts => "accounts",
            Collection::Categories => "categories",
            Collection::Transactions => "transactions",
        }
    }

    /// Path of the collection relative to the API base.
    pub fn endpoint(&self) -> String {
        format!("/{}", self.as_str())
    }

    /// Path of a single resource relative to the API base.
    pub fn resource_endpoint(&self, id: &str) -> String {
        format!("/{}/{}", self.as_str(), id)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "accounts" | "account" => Ok(Collection::Accounts),
            "categories" | "category" => Ok(Collection::Categories),
            "transactions" | "transaction" => Ok(Collection::Transactions),
            _ => Err(Error::InvalidCollection(s.to_string())),
        }
    }
}

/// Which identity scheme an id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    Remote,
    Provisional,
}

impl IdentityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::Remote => "remote",
            IdentityKind::Provisional => "provisional",
        }
    }
}

impl FromStr for IdentityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "remote" => Ok(IdentityKind::Remote),
            "provisional" => Ok(IdentityKind::Provisional),
            _ => Err(Error::CorruptedData(format!("invalid identity kind '{s}'"))),
        }
    }
}

/// Identifier of a record, tagged with the scheme that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Identity {
    /// Stable id assigned by the remote store.
    Remote(String),
    /// Locally generated id, valid until the create is reconciled.
    Provisional(String),
}

impl Identity {
    /// Mint a fresh provisional identity.
    ///
    /// Format: `local-{hash}` where hash is the first 16 hex chars of
    /// SHA256(timestamp + process id + counter).
    pub fn provisional() -> Self {
        let seq = PROVISIONAL_COUNTER.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let input = format!(
            "{}:{}:{}:{}",
            now.to_rfc3339(),
            now.timestamp_subsec_nanos(),
            std::process::id(),
            seq
        );
        let hash = Sha256::digest(input.as_bytes());
        Identity::Provisional(format!("{}-{}", PROVISIONAL_PREFIX, hex::encode(&hash[..8])))
    }

    /// Rebuild an identity from its stored parts.
    pub fn from_parts(kind: IdentityKind, id: impl Into<String>) -> Self {
        match kind {
            IdentityKind::Remote => Identity::Remote(id.into()),
            IdentityKind::Provisional => Identity::Provisional(id.into()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Identity::Remote(id) | Identity::Provisional(id) => id,
        }
    }

    pub fn kind(&self) -> IdentityKind {
        match self {
            Identity::Remote(_) => IdentityKind::Remote,
            Identity::Provisional(_) => IdentityKind::Provisional,
        }
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, Identity::Provisional(_))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a cached record relates to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Matches the last snapshot received from the remote.
    Synced,
    /// Written locally; a queued operation has not reached the remote yet.
    Pending,
    /// The queued operation was abandoned and needs manual attention.
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Synced => "synced",
            SyncStatus::Pending => "pending",
            SyncStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "synced" => Ok(SyncStatus::Synced),
            "pending" => Ok(SyncStatus::Pending),
            "failed" => Ok(SyncStatus::Failed),
            _ => Err(Error::CorruptedData(format!("invalid sync status '{s}'"))),
        }
    }
}

/// Direction of money movement for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    Income,
    Expense,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Income => "income",
            TxType::Expense => "expense",
        }
    }
}

impl FromStr for TxType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "income" => Ok(TxType::Income),
            "expense" => Ok(TxType::Expense),
            _ => Err(Error::InvalidTxType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub account_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub balance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tx_type: TxType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_recurring: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

/// The remote sends `null` for optional lists and flags it never set.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Narrowing of a transaction listing, applied by the remote and, when
/// serving from cache, locally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Inclusive lower bound on `tx_date` (`YYYY-MM-DD`).
    pub start_date: Option<String>,
    /// Inclusive upper bound on `tx_date`.
    pub end_date: Option<String>,
    pub account_id: Option<String>,
    /// Case-insensitive match against the description or any tag.
    pub search: Option<String>,
}

impl TransactionFilter {
    pub fn is_empty(&self) -> bool {
        self.query().is_empty()
    }

    /// Query parameters understood by the transactions endpoint.
    pub fn query(&self) -> Vec<(String, String)> {
        [
            ("start_date", &self.start_date),
            ("end_date", &self.end_date),
            ("account_id", &self.account_id),
            ("search", &self.search),
        ]
        .into_iter()
        .filter_map(|(key, value)| Some((key.to_string(), given(value)?.to_string())))
        .collect()
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(start) = given(&self.start_date) {
            if tx.tx_date.as_deref().is_none_or(|d| d < start) {
                return false;
            }
        }
        if let Some(end) = given(&self.end_date) {
            // Dates may carry a time part; compare on the day.
            if tx.tx_date.as_deref().is_none_or(|d| d.get(..end.len()).unwrap_or(d) > end) {
                return false;
            }
        }
        if let Some(account) = given(&self.account_id) {
            if tx.account_id.as_deref() != Some(account) {
                return false;
            }
        }
        if let Some(search) = given(&self.search) {
            let needle = search.to_lowercase();
            let in_description = tx
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            let in_tags = tx.tags.iter().any(|t| t.to_lowercase().contains(&needle));
            if !in_description && !in_tags {
                return false;
            }
        }
        true
    }

    /// Whether a record passes the filter. Records of other collections never do.
    pub fn admits(&self, record: &Record) -> bool {
        match &record.entity {
            Entity::Transaction(tx) => self.matches(tx),
            _ => false,
        }
    }
}

/// Typed body of a record, one variant per collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Account(Account),
    Category(Category),
    Transaction(Transaction),
}

impl Entity {
    pub fn collection(&self) -> Collection {
        match self {
            Entity::Account(_) => Collection::Accounts,
            Entity::Category(_) => Collection::Categories,
            Entity::Transaction(_) => Collection::Transactions,
        }
    }

    /// Serialize to the JSON body exchanged with the remote.
    pub fn to_body(&self) -> Result<serde_json::Value> {
        let value = match self {
            Entity::Account(a) => serde_json::to_value(a)?,
            Entity::Category(c) => serde_json::to_value(c)?,
            Entity::Transaction(t) => serde_json::to_value(t)?,
        };
        Ok(value)
    }

    /// Parse a JSON body for the given collection. Unknown fields (server-side
    /// bookkeeping like `user_id`) are ignored.
    pub fn from_body(collection: Collection, body: serde_json::Value) -> Result<Self> {
        let entity = match collection {
            Collection::Accounts => Entity::Account(serde_json::from_value(body)?),
            Collection::Categories => Entity::Category(serde_json::from_value(body)?),
            Collection::Transactions => {
                let tx: Transaction = serde_json::from_value(body)?;
                if !tx.amount.is_finite() {
                    return Err(Error::InvalidInput(format!(
                        "transaction amount must be finite, got {}",
                        tx.amount
                    )));
                }
                Entity::Transaction(tx)
            }
        };
        Ok(entity)
    }

    /// Ids of other records this body refers to.
    pub fn references(&self) -> Vec<&str> {
        match self {
            Entity::Transaction(t) => t
                .account_id
                .iter()
                .chain(t.category_id.iter())
                .map(String::as_str)
                .collect(),
            Entity::Account(_) | Entity::Category(_) => Vec::new(),
        }
    }

    /// Replace every reference to `from` with `to`. Returns true if anything changed.
    pub fn rewrite_reference(&mut self, from: &str, to: &str) -> bool {
        let Entity::Transaction(t) = self else {
            return false;
        };
        let mut changed = false;
        for slot in [&mut t.account_id, &mut t.category_id] {
            if slot.as_deref() == Some(from) {
                *slot = Some(to.to_string());
                changed = true;
            }
        }
        changed
    }
}

/// A cached record: identity, sync state, and typed body.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub identity: Identity,
    pub sync_status: SyncStatus,
    pub entity: Entity,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    pub fn new(identity: Identity, sync_status: SyncStatus, entity: Entity) -> Self {
        Record {
            identity,
            sync_status,
            entity,
            updated_at: Utc::now(),
        }
    }

    pub fn collection(&self) -> Collection {
        self.entity.collection()
    }

    /// Build a synced record from an authoritative remote body.
    ///
    /// The body must carry an `id` (string or number).
    pub fn from_remote(collection: Collection, body: serde_json::Value) -> Result<Self> {
        let id = remote_id(&body).ok_or_else(|| {
            Error::CorruptedData(format!("remote {collection} record has no id"))
        })?;
        let entity = Entity::from_body(collection, body)?;
        Ok(Record::new(Identity::Remote(id), SyncStatus::Synced, entity))
    }

    /// JSON view used by callers that export records.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut body = self.entity.to_body()?;
        if let serde_json::Value::Object(ref mut map) = body {
            map.insert("id".into(), self.identity.as_str().into());
            map.insert("identity_kind".into(), self.identity.kind().as_str().into());
            map.insert("sync_status".into(), self.sync_status.as_str().into());
            map.insert("updated_at".into(), self.updated_at.to_rfc3339().into());
        }
        Ok(body)
    }
}

/// Extract the remote-assigned id from a response body.
pub fn remote_id(body: &serde_json::Value) -> Option<String> {
    match body.get("id")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;

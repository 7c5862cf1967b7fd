// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable, ordered log of remote mutations that could not be applied
//! synchronously.
//!
//! Entries are replayed in global sequence order. [`OperationQueue::next_batch`]
//! claims entries (`pending` → `in_flight`) inside the same transaction that
//! selects them, so two concurrent drains never pick up the same entry, and
//! it never claims an entry while an earlier unsettled entry targets the same
//! resource or a resource the entry's payload refers to.
//!
//! Entry lifecycle:
//!
//! ```text
//! pending ──claim──► in_flight ──ok──► (removed)
//!    ▲                   │
//!    └──retry/release────┤
//!                        └──rejected / ceiling──► failed
//! ```

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{parse_db, parse_timestamp, Database};
use crate::entity::{Collection, Entity, Identity, IdentityKind};
use crate::error::{Error, Result};

/// Attempts allowed before an entry is abandoned.
pub const DEFAULT_RETRY_CEILING: u32 = 5;

const ENTRY_COLUMNS: &str = "sequence, kind, collection, target_id, target_kind, payload, \
                             depends_on, enqueued_at, attempt_count, status, last_error";

/// The remote mutation an entry stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(OperationKind::Create),
            "update" => Ok(OperationKind::Update),
            "delete" => Ok(OperationKind::Delete),
            _ => Err(Error::CorruptedData(format!("invalid operation kind '{s}'"))),
        }
    }
}

/// Replay state of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    InFlight,
    Synced,
    Failed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::InFlight => "in_flight",
            EntryStatus::Synced => "synced",
            EntryStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(EntryStatus::Pending),
            "in_flight" => Ok(EntryStatus::InFlight),
            "synced" => Ok(EntryStatus::Synced),
            "failed" => Ok(EntryStatus::Failed),
            _ => Err(Error::CorruptedData(format!("invalid entry status '{s}'"))),
        }
    }
}

/// A record addressed by collection and identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub collection: Collection,
    pub identity: Identity,
}

impl ResourceRef {
    pub fn new(collection: Collection, identity: Identity) -> Self {
        ResourceRef {
            collection,
            identity,
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.identity)
    }
}

/// One queued remote mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub sequence: i64,
    pub kind: OperationKind,
    pub target: ResourceRef,
    /// Body to send; absent for deletes.
    pub payload: Option<Entity>,
    /// Provisional ids referenced by the payload.
    pub depends_on: Vec<String>,
    pub enqueued_at: DateTime<Utc>,
    pub attempt_count: u32,
    pub status: EntryStatus,
    pub last_error: Option<String>,
}

impl QueueEntry {
    /// JSON view used for inspection and export.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let payload = match &self.payload {
            Some(entity) => entity.to_body()?,
            None => serde_json::Value::Null,
        };
        Ok(serde_json::json!({
            "sequence": self.sequence,
            "kind": self.kind,
            "collection": self.target.collection,
            "target": self.target.identity,
            "payload": payload,
            "depends_on": self.depends_on,
            "enqueued_at": self.enqueued_at.to_rfc3339(),
            "attempt_count": self.attempt_count,
            "status": self.status,
            "last_error": self.last_error,
        }))
    }
}

/// Result of [`OperationQueue::mark_failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Back to `pending`; a later drain will try again.
    Retrying { attempt_count: u32 },
    /// Terminal; excluded from every future batch.
    Abandoned { attempt_count: u32 },
}

/// Fixed-width claim timestamp so claims compare correctly as text.
fn claim_stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_failure(column: &str, err: impl fmt::Display) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(Error::CorruptedData(format!(
            "invalid value in column '{column}': {err}"
        ))),
    )
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<QueueEntry> {
    let kind: String = row.get(1)?;
    let collection: String = row.get(2)?;
    let target_id: String = row.get(3)?;
    let target_kind: String = row.get(4)?;
    let payload: Option<String> = row.get(5)?;
    let depends_on: String = row.get(6)?;
    let enqueued_at: String = row.get(7)?;
    let attempt_count: i64 = row.get(8)?;
    let status: String = row.get(9)?;

    let collection: Collection = parse_db(&collection, "collection")?;
    let target_kind: IdentityKind = parse_db(&target_kind, "target_kind")?;
    let payload = match payload {
        Some(body) => {
            let value: serde_json::Value =
                serde_json::from_str(&body).map_err(|e| conversion_failure("payload", e))?;
            Some(Entity::from_body(collection, value).map_err(|e| conversion_failure("payload", e))?)
        }
        None => None,
    };

    Ok(QueueEntry {
        sequence: row.get(0)?,
        kind: parse_db(&kind, "kind")?,
        target: ResourceRef::new(collection, Identity::from_parts(target_kind, target_id)),
        payload,
        depends_on: serde_json::from_str(&depends_on)
            .map_err(|e| conversion_failure("depends_on", e))?,
        enqueued_at: parse_timestamp(&enqueued_at, "enqueued_at")?,
        attempt_count: u32::try_from(attempt_count)
            .map_err(|e| conversion_failure("attempt_count", e))?,
        status: parse_db(&status, "status")?,
        last_error: row.get(10)?,
    })
}

fn select_entries(conn: &Connection, filter: &str) -> Result<Vec<QueueEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM sync_queue {filter} ORDER BY sequence"
    ))?;
    let rows = stmt
        .query_map([], row_to_entry)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn get_in(conn: &Connection, sequence: i64) -> Result<Option<QueueEntry>> {
    let entry = conn
        .query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM sync_queue WHERE sequence = ?1"),
            params![sequence],
            row_to_entry,
        )
        .optional()?;
    Ok(entry)
}

pub(crate) fn enqueue_in(
    conn: &Connection,
    kind: OperationKind,
    target: &ResourceRef,
    payload: Option<&Entity>,
) -> Result<i64> {
    let body = match payload {
        Some(entity) => Some(serde_json::to_string(&entity.to_body()?)?),
        None => None,
    };
    // Only provisional references can still change; remote ones are final.
    let mut depends_on = Vec::new();
    if let Some(entity) = payload {
        for id in entity.references() {
            if is_unsettled_provisional(conn, id)? {
                depends_on.push(id.to_string());
            }
        }
    }

    conn.execute(
        "INSERT INTO sync_queue (kind, collection, target_id, target_kind, payload, depends_on,
                                 enqueued_at, attempt_count, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 'pending')",
        params![
            kind.as_str(),
            target.collection.as_str(),
            target.identity.as_str(),
            target.identity.kind().as_str(),
            body,
            serde_json::to_string(&depends_on)?,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// True if `id` is the target of a create that has not reached the remote.
fn is_unsettled_provisional(conn: &Connection, id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sync_queue
         WHERE target_id = ?1 AND target_kind = 'provisional' AND kind = 'create'
           AND status IN ('pending', 'in_flight')",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub(crate) fn has_unsettled_in(conn: &Connection, target: &ResourceRef) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sync_queue
         WHERE collection = ?1 AND target_id = ?2 AND target_kind = ?3
           AND status IN ('pending', 'in_flight')",
        params![
            target.collection.as_str(),
            target.identity.as_str(),
            target.identity.kind().as_str()
        ],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub(crate) fn has_pending_create_in(conn: &Connection, target: &ResourceRef) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sync_queue
         WHERE collection = ?1 AND target_id = ?2 AND target_kind = ?3
           AND kind = 'create' AND status = 'pending'",
        params![
            target.collection.as_str(),
            target.identity.as_str(),
            target.identity.kind().as_str()
        ],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub(crate) fn unsettled_in(conn: &Connection, collection: Collection) -> Result<Vec<QueueEntry>> {
    let entries = select_entries(conn, "WHERE status IN ('pending', 'in_flight', 'failed')")?;
    Ok(entries
        .into_iter()
        .filter(|e| e.target.collection == collection)
        .collect())
}

pub(crate) fn mark_synced_in(conn: &Connection, sequence: i64) -> Result<()> {
    let affected = conn.execute(
        "DELETE FROM sync_queue WHERE sequence = ?1",
        params![sequence],
    )?;
    if affected == 0 {
        return Err(Error::EntryNotFound(sequence));
    }
    Ok(())
}

/// Point every unsettled entry that refers to `provisional` at `remote`
/// instead: targets, payload references, and dependency lists.
pub(crate) fn retarget_in(conn: &Connection, provisional: &Identity, remote: &Identity) -> Result<usize> {
    let from = provisional.as_str();
    let to = remote.as_str();
    let mut changed = conn.execute(
        "UPDATE sync_queue SET target_id = ?1, target_kind = ?2
         WHERE target_id = ?3 AND target_kind = ?4 AND status IN ('pending', 'in_flight', 'failed')",
        params![to, remote.kind().as_str(), from, provisional.kind().as_str()],
    )?;

    let referencing = select_entries(
        conn,
        "WHERE status IN ('pending', 'in_flight', 'failed') AND (payload IS NOT NULL OR depends_on != '[]')",
    )?;
    for mut entry in referencing {
        let mut touched = false;
        if let Some(payload) = entry.payload.as_mut() {
            touched |= payload.rewrite_reference(from, to);
        }
        let before = entry.depends_on.len();
        entry.depends_on.retain(|id| id != from);
        touched |= entry.depends_on.len() != before;

        if touched {
            let body = match &entry.payload {
                Some(entity) => Some(serde_json::to_string(&entity.to_body()?)?),
                None => None,
            };
            conn.execute(
                "UPDATE sync_queue SET payload = ?1, depends_on = ?2 WHERE sequence = ?3",
                params![body, serde_json::to_string(&entry.depends_on)?, entry.sequence],
            )?;
            changed += 1;
        }
    }
    Ok(changed)
}

/// Abandon every pending entry that targets or depends on `id`. Returns the
/// entries that were abandoned.
pub(crate) fn abandon_dependents_in(conn: &Connection, id: &str, reason: &str) -> Result<Vec<QueueEntry>> {
    let unsettled = select_entries(conn, "WHERE status = 'pending'")?;
    let mut abandoned = Vec::new();
    for mut entry in unsettled {
        if entry.target.identity.as_str() == id || entry.depends_on.iter().any(|d| d == id) {
            conn.execute(
                "UPDATE sync_queue SET status = 'failed', last_error = ?1 WHERE sequence = ?2",
                params![reason, entry.sequence],
            )?;
            entry.status = EntryStatus::Failed;
            entry.last_error = Some(reason.to_string());
            abandoned.push(entry);
        }
    }
    Ok(abandoned)
}

/// Remove every pending entry for `target`. In-flight entries are left alone.
pub(crate) fn cancel_target_in(conn: &Connection, target: &ResourceRef) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM sync_queue
         WHERE collection = ?1 AND target_id = ?2 AND target_kind = ?3 AND status = 'pending'",
        params![
            target.collection.as_str(),
            target.identity.as_str(),
            target.identity.kind().as_str()
        ],
    )?;
    Ok(removed)
}

/// Durable operation log.
#[derive(Clone)]
pub struct OperationQueue {
    db: Arc<Database>,
    retry_ceiling: u32,
}

impl OperationQueue {
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_retry_ceiling(db, DEFAULT_RETRY_CEILING)
    }

    pub fn with_retry_ceiling(db: Arc<Database>, retry_ceiling: u32) -> Self {
        OperationQueue {
            db,
            retry_ceiling: retry_ceiling.max(1),
        }
    }

    pub fn retry_ceiling(&self) -> u32 {
        self.retry_ceiling
    }

    /// Append an entry and return its sequence number.
    pub fn enqueue(
        &self,
        kind: OperationKind,
        target: &ResourceRef,
        payload: Option<&Entity>,
    ) -> Result<i64> {
        let sequence = self
            .db
            .transaction(|tx| enqueue_in(tx, kind, target, payload))?;
        tracing::debug!("enqueued #{} {} {}", sequence, kind, target);
        Ok(sequence)
    }

    /// Claim up to `max` pending entries in sequence order.
    ///
    /// An entry is skipped while an earlier unsettled entry targets the same
    /// resource or one of its dependencies; at most one entry per target is
    /// claimed per batch.
    pub fn next_batch(&self, max: usize) -> Result<Vec<QueueEntry>> {
        self.claim_batch(max, &HashSet::new())
    }

    /// Like [`next_batch`](Self::next_batch), but entries in `skip` are left
    /// pending. Skipped entries still hold back later entries for their target.
    pub fn claim_batch(&self, max: usize, skip: &HashSet<i64>) -> Result<Vec<QueueEntry>> {
        if max == 0 {
            return Ok(Vec::new());
        }

        self.db.transaction(|tx| {
            let unsettled = select_entries(tx, "WHERE status IN ('pending', 'in_flight')")?;
            let mut busy_targets: HashSet<ResourceRef> = HashSet::new();
            let mut busy_ids: HashSet<String> = HashSet::new();
            let mut batch = Vec::new();

            for mut entry in unsettled {
                let waiting = entry.status == EntryStatus::InFlight || skip.contains(&entry.sequence);
                if !waiting && batch.len() >= max {
                    break;
                }
                let blocked = busy_targets.contains(&entry.target)
                    || entry.depends_on.iter().any(|d| busy_ids.contains(d));
                busy_ids.insert(entry.target.identity.as_str().to_string());
                busy_targets.insert(entry.target.clone());
                if waiting || blocked {
                    continue;
                }

                tx.execute(
                    "UPDATE sync_queue SET status = 'in_flight', claimed_at = ?1 WHERE sequence = ?2",
                    params![claim_stamp(Utc::now()), entry.sequence],
                )?;
                entry.status = EntryStatus::InFlight;
                batch.push(entry);
            }
            Ok(batch)
        })
    }

    /// The entry reached the remote; remove it.
    pub fn mark_synced(&self, sequence: i64) -> Result<()> {
        self.db.with_conn(|conn| mark_synced_in(conn, sequence))
    }

    /// Record a failed attempt. The entry returns to `pending` when
    /// `retry_again` is set and the ceiling has not been reached; otherwise it
    /// becomes `failed` for good.
    pub fn mark_failed(&self, sequence: i64, retry_again: bool, error: &str) -> Result<FailOutcome> {
        let ceiling = self.retry_ceiling;
        self.db.transaction(|tx| {
            let entry = get_in(tx, sequence)?.ok_or(Error::EntryNotFound(sequence))?;
            let attempt_count = entry.attempt_count.saturating_add(1);
            let terminal = !retry_again || attempt_count >= ceiling;
            let status = if terminal {
                EntryStatus::Failed
            } else {
                EntryStatus::Pending
            };
            tx.execute(
                "UPDATE sync_queue SET status = ?1, attempt_count = ?2, last_error = ?3, claimed_at = NULL
                 WHERE sequence = ?4",
                params![status.as_str(), attempt_count, error, sequence],
            )?;
            Ok(if terminal {
                FailOutcome::Abandoned { attempt_count }
            } else {
                FailOutcome::Retrying { attempt_count }
            })
        })
    }

    /// Return a claimed entry to `pending` without counting an attempt.
    pub fn release(&self, sequence: i64) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE sync_queue SET status = 'pending', claimed_at = NULL
                 WHERE sequence = ?1 AND status = 'in_flight'",
                params![sequence],
            )?;
            Ok(())
        })
    }

    /// Entries still waiting to reach the remote (pending or in flight).
    pub fn pending_count(&self) -> Result<usize> {
        let count: i64 = self.db.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM sync_queue WHERE status IN ('pending', 'in_flight')",
                [],
                |row| row.get(0),
            )?)
        })?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Entries whose retries were exhausted or that the remote rejected.
    pub fn failed_entries(&self) -> Result<Vec<QueueEntry>> {
        self.db
            .with_conn(|conn| select_entries(conn, "WHERE status = 'failed'"))
    }

    /// Every entry in sequence order.
    pub fn entries(&self) -> Result<Vec<QueueEntry>> {
        self.db.with_conn(|conn| select_entries(conn, ""))
    }

    pub fn get(&self, sequence: i64) -> Result<Option<QueueEntry>> {
        self.db.with_conn(|conn| get_in(conn, sequence))
    }

    /// Unsettled entries (pending, in flight, or failed) for one collection.
    pub fn unsettled_for(&self, collection: Collection) -> Result<Vec<QueueEntry>> {
        self.db.with_conn(|conn| unsettled_in(conn, collection))
    }

    /// The still-pending create for `target`, if any.
    pub fn pending_create(&self, target: &ResourceRef) -> Result<Option<QueueEntry>> {
        let entries = self
            .db
            .with_conn(|conn| select_entries(conn, "WHERE kind = 'create' AND status = 'pending'"))?;
        Ok(entries.into_iter().find(|e| e.target == *target))
    }

    /// True while a pending or in-flight entry targets `target`.
    pub fn has_unsettled(&self, target: &ResourceRef) -> Result<bool> {
        self.db.with_conn(|conn| has_unsettled_in(conn, target))
    }

    /// True while `id` names a record whose create has not reached the remote.
    pub fn awaits_create(&self, id: &str) -> Result<bool> {
        self.db.with_conn(|conn| is_unsettled_provisional(conn, id))
    }

    /// Put a failed entry back in line with a fresh attempt budget.
    pub fn retry_failed(&self, sequence: i64) -> Result<()> {
        self.db.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE sync_queue SET status = 'pending', attempt_count = 0, last_error = NULL
                 WHERE sequence = ?1 AND status = 'failed'",
                params![sequence],
            )?;
            if affected == 0 {
                return Err(Error::EntryNotFound(sequence));
            }
            Ok(())
        })
    }

    /// Drop a failed entry without replaying it.
    pub fn discard(&self, sequence: i64) -> Result<QueueEntry> {
        self.db.transaction(|tx| {
            let entry = get_in(tx, sequence)?
                .filter(|e| e.status == EntryStatus::Failed)
                .ok_or(Error::EntryNotFound(sequence))?;
            tx.execute(
                "DELETE FROM sync_queue WHERE sequence = ?1",
                params![sequence],
            )?;
            Ok(entry)
        })
    }

    /// Return entries claimed longer than `older_than` ago to `pending`.
    ///
    /// Claims left behind by a process that died mid-drain would otherwise
    /// block their target forever.
    pub fn recover_stale(&self, older_than: Duration) -> Result<usize> {
        let cutoff = Utc::now() - older_than;
        let recovered = self.db.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE sync_queue SET status = 'pending', claimed_at = NULL
                 WHERE status = 'in_flight' AND (claimed_at IS NULL OR claimed_at <= ?1)",
                params![claim_stamp(cutoff)],
            )?)
        })?;
        if recovered > 0 {
            tracing::warn!("recovered {} stale in-flight entries", recovered);
        }
        Ok(recovered)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

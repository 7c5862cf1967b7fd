// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable typed cache of entity snapshots.
//!
//! Records are keyed by `(collection, id)` and keep the position at which
//! they were first inserted, so [`LocalStore::scan`] returns them in
//! insertion order. [`LocalStore::bulk_replace`] swaps a whole collection in
//! one transaction: readers see either the previous snapshot or the new one.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{parse_db, parse_timestamp, Database};
use crate::entity::{Collection, Entity, Identity, IdentityKind, Record, SyncStatus};
use crate::error::{Error, Result};

const RECORD_COLUMNS: &str = "collection, id, identity_kind, sync_status, body, updated_at";

fn conversion_failure(column: &str, err: impl std::fmt::Display) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(Error::CorruptedData(format!(
            "invalid value in column '{column}': {err}"
        ))),
    )
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    let collection: String = row.get(0)?;
    let id: String = row.get(1)?;
    let kind: String = row.get(2)?;
    let status: String = row.get(3)?;
    let body: String = row.get(4)?;
    let updated: String = row.get(5)?;

    let collection: Collection = parse_db(&collection, "collection")?;
    let kind: IdentityKind = parse_db(&kind, "identity_kind")?;
    let value: serde_json::Value =
        serde_json::from_str(&body).map_err(|e| conversion_failure("body", e))?;
    let entity = Entity::from_body(collection, value).map_err(|e| conversion_failure("body", e))?;

    Ok(Record {
        identity: Identity::from_parts(kind, id),
        sync_status: parse_db(&status, "sync_status")?,
        entity,
        updated_at: parse_timestamp(&updated, "updated_at")?,
    })
}

/// Insert or overwrite a record, keeping its original position when it exists.
pub(crate) fn put_in(conn: &Connection, record: &Record) -> Result<()> {
    let collection = record.collection();
    let body = serde_json::to_string(&record.entity.to_body()?)?;
    conn.execute(
        "INSERT INTO records (collection, id, identity_kind, sync_status, body, position, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5,
                 (SELECT COALESCE(MAX(position), 0) + 1 FROM records WHERE collection = ?1), ?6)
         ON CONFLICT(collection, id) DO UPDATE SET
             identity_kind = excluded.identity_kind,
             sync_status = excluded.sync_status,
             body = excluded.body,
             updated_at = excluded.updated_at",
        params![
            collection.as_str(),
            record.identity.as_str(),
            record.identity.kind().as_str(),
            record.sync_status.as_str(),
            body,
            record.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub(crate) fn get_in(conn: &Connection, collection: Collection, id: &str) -> Result<Option<Record>> {
    let record = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM records WHERE collection = ?1 AND id = ?2"),
            params![collection.as_str(), id],
            row_to_record,
        )
        .optional()?;
    Ok(record)
}

pub(crate) fn delete_in(conn: &Connection, collection: Collection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM records WHERE collection = ?1 AND id = ?2",
        params![collection.as_str(), id],
    )?;
    Ok(affected > 0)
}

pub(crate) fn set_status_in(
    conn: &Connection,
    collection: Collection,
    id: &str,
    status: SyncStatus,
) -> Result<()> {
    conn.execute(
        "UPDATE records SET sync_status = ?1 WHERE collection = ?2 AND id = ?3",
        params![status.as_str(), collection.as_str(), id],
    )?;
    Ok(())
}

/// Replace a provisional record with its reconciled counterpart and migrate
/// every reference to the provisional id held by other records.
///
/// `reconciled` must carry the remote identity. The row keeps its insertion
/// position. Returns the number of other records whose references changed.
pub(crate) fn reconcile_identity_in(
    conn: &Connection,
    provisional: &Identity,
    reconciled: &Record,
) -> Result<usize> {
    let collection = reconciled.collection();
    let body = serde_json::to_string(&reconciled.entity.to_body()?)?;
    if provisional.as_str() != reconciled.identity.as_str()
        && get_in(conn, collection, provisional.as_str())?.is_some()
    {
        // A read may have cached the server copy already; the local row takes its place.
        delete_in(conn, collection, reconciled.identity.as_str())?;
    }
    let moved = conn.execute(
        "UPDATE records SET id = ?1, identity_kind = ?2, sync_status = ?3, body = ?4, updated_at = ?5
         WHERE collection = ?6 AND id = ?7",
        params![
            reconciled.identity.as_str(),
            reconciled.identity.kind().as_str(),
            reconciled.sync_status.as_str(),
            body,
            reconciled.updated_at.to_rfc3339(),
            collection.as_str(),
            provisional.as_str(),
        ],
    )?;
    if moved == 0 {
        // The local copy was dropped (e.g. by a snapshot replace); keep the server's.
        put_in(conn, reconciled)?;
    }
    migrate_references_in(conn, provisional.as_str(), reconciled.identity.as_str())
}

/// Rewrite every record that refers to `from` so it refers to `to`.
/// Returns the number of records changed.
pub(crate) fn migrate_references_in(conn: &Connection, from: &str, to: &str) -> Result<usize> {
    let pattern = format!("%{from}%");
    let referencing = {
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE body LIKE ?1 ORDER BY collection, position"
        ))?;
        let rows = stmt
            .query_map([pattern], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };

    let mut migrated = 0;
    for mut record in referencing {
        if record.entity.rewrite_reference(from, to) {
            record.updated_at = Utc::now();
            put_in(conn, &record)?;
            migrated += 1;
        }
    }
    Ok(migrated)
}

pub(crate) fn scan_in(conn: &Connection, collection: Collection) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM records WHERE collection = ?1 ORDER BY position"
    ))?;
    let rows = stmt
        .query_map(params![collection.as_str()], row_to_record)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Discard every record of `collection` and install `records` in order.
pub(crate) fn replace_in(conn: &Connection, collection: Collection, records: &[Record]) -> Result<()> {
    if let Some(stray) = records.iter().find(|r| r.collection() != collection) {
        return Err(Error::InvalidInput(format!(
            "record {} belongs to {}, not {}",
            stray.identity,
            stray.collection(),
            collection
        )));
    }
    conn.execute(
        "DELETE FROM records WHERE collection = ?1",
        params![collection.as_str()],
    )?;
    for record in records {
        put_in(conn, record)?;
    }
    Ok(())
}

/// Typed key-value cache of domain entities.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Database>,
}

impl LocalStore {
    pub fn new(db: Arc<Database>) -> Self {
        LocalStore { db }
    }

    /// Insert or overwrite a single record.
    pub fn put(&self, record: &Record) -> Result<()> {
        self.db.with_conn(|conn| put_in(conn, record))
    }

    /// Atomically discard every record of `collection` and install `records`
    /// in the given order. On failure the previous contents stay intact.
    pub fn bulk_replace(&self, collection: Collection, records: &[Record]) -> Result<()> {
        self.db
            .transaction(|tx| replace_in(tx, collection, records))?;
        tracing::debug!("replaced {} snapshot with {} records", collection, records.len());
        Ok(())
    }

    /// Look up a record by identity. The identity kind must match.
    pub fn get(&self, collection: Collection, identity: &Identity) -> Result<Option<Record>> {
        let record = self
            .db
            .with_conn(|conn| get_in(conn, collection, identity.as_str()))?;
        Ok(record.filter(|r| r.identity == *identity))
    }

    /// Look up a record by its bare id, whatever its identity kind.
    pub fn resolve(&self, collection: Collection, id: &str) -> Result<Option<Record>> {
        self.db.with_conn(|conn| get_in(conn, collection, id))
    }

    /// All records of a collection in insertion order.
    pub fn scan(&self, collection: Collection) -> Result<Vec<Record>> {
        self.scan_where(collection, |_| true)
    }

    /// Records of a collection matching `predicate`, in insertion order.
    pub fn scan_where<P>(&self, collection: Collection, predicate: P) -> Result<Vec<Record>>
    where
        P: Fn(&Record) -> bool,
    {
        let records = self.db.with_conn(|conn| scan_in(conn, collection))?;
        Ok(records.into_iter().filter(|r| predicate(r)).collect())
    }

    /// Remove a record. Returns false if it was not present.
    pub fn delete(&self, collection: Collection, identity: &Identity) -> Result<bool> {
        if self.get(collection, identity)?.is_none() {
            return Ok(false);
        }
        self.db
            .with_conn(|conn| delete_in(conn, collection, identity.as_str()))
    }

    /// Update only the sync status of a record.
    pub fn set_status(
        &self,
        collection: Collection,
        identity: &Identity,
        status: SyncStatus,
    ) -> Result<()> {
        self.db
            .with_conn(|conn| set_status_in(conn, collection, identity.as_str(), status))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

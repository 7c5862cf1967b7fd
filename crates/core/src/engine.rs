// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Offline-first write/read/drain orchestration.
//!
//! Writes are attempted against the remote once when the device looks online
//! and a credential is at hand. Anything transient (no route, timeout, 5xx)
//! sends the write down the offline path instead: the local record is written
//! with `sync_status = pending` and an entry is appended to the
//! [`OperationQueue`]. A later [`SyncEngine::drain`] replays entries in
//! sequence order and rewrites provisional identities once their creates are
//! acknowledged.
//!
//! Reads always answer. A successful fetch replaces the cached snapshot
//! (keeping unsettled local writes visible); a failed fetch returns the cache
//! marked stale.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::connectivity::{ConnectivityMonitor, Subscription};
use crate::db::Database;
use crate::entity::{
    remote_id, Collection, Entity, Identity, Record, SyncStatus, TransactionFilter,
};
use crate::error::{Error, Result};
use crate::queue::{
    self, EntryStatus, FailOutcome, OperationKind, OperationQueue, QueueEntry, ResourceRef,
    DEFAULT_RETRY_CEILING,
};
use crate::remote::{CredentialProvider, Method, RemoteClient, RemoteRequest};
use crate::store::{self, LocalStore};

/// Tunables for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Attempts before a queue entry is abandoned.
    pub retry_ceiling: u32,
    /// Entries claimed per `next_batch` call during a drain.
    pub batch_size: usize,
    /// Upper bound on a single remote call.
    pub call_timeout: Duration,
    /// In-flight claims older than this are returned to pending on startup.
    pub stale_claim_after: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            retry_ceiling: DEFAULT_RETRY_CEILING,
            batch_size: 20,
            call_timeout: Duration::from_secs(10),
            stale_claim_after: Duration::from_secs(300),
        }
    }
}

/// A change requested by the application.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Create(Entity),
    Update { target: Identity, entity: Entity },
    Delete { collection: Collection, target: Identity },
}

impl Mutation {
    pub fn collection(&self) -> Collection {
        match self {
            Mutation::Create(entity) | Mutation::Update { entity, .. } => entity.collection(),
            Mutation::Delete { collection, .. } => *collection,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Mutation::Create(_) => OperationKind::Create,
            Mutation::Update { .. } => OperationKind::Update,
            Mutation::Delete { .. } => OperationKind::Delete,
        }
    }

    fn entity(&self) -> Option<&Entity> {
        match self {
            Mutation::Create(entity) | Mutation::Update { entity, .. } => Some(entity),
            Mutation::Delete { .. } => None,
        }
    }

    fn target(&self) -> Option<ResourceRef> {
        match self {
            Mutation::Create(_) => None,
            Mutation::Update { target, entity } => {
                Some(ResourceRef::new(entity.collection(), target.clone()))
            }
            Mutation::Delete { collection, target } => {
                Some(ResourceRef::new(*collection, target.clone()))
            }
        }
    }
}

/// What happened to a write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The remote accepted it. `record` is the authoritative state (absent
    /// for deletes).
    Reconciled { record: Option<Record> },
    /// Applied locally and queued for a later drain.
    Queued {
        sequence: i64,
        record: Option<Record>,
    },
    /// A delete cancelled a create that never left the device.
    Collapsed,
}

impl WriteOutcome {
    pub fn record(&self) -> Option<&Record> {
        match self {
            WriteOutcome::Reconciled { record } | WriteOutcome::Queued { record, .. } => {
                record.as_ref()
            }
            WriteOutcome::Collapsed => None,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, WriteOutcome::Queued { .. })
    }
}

/// Records returned by [`SyncEngine::read`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOutcome {
    pub records: Vec<Record>,
    /// True when the remote could not be reached and the cache was returned.
    pub stale: bool,
}

/// Why a drain stopped before the queue ran dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStop {
    /// A call got no response; the rest waits for the next drain.
    Offline,
    NoCredential,
    Cancelled,
}

/// Tally of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub synced: usize,
    pub retrying: usize,
    pub abandoned: usize,
    /// Claimed entries handed back untouched.
    pub released: usize,
    pub stopped: Option<DrainStop>,
}

impl DrainReport {
    pub fn attempted(&self) -> usize {
        self.synced + self.retrying + self.abandoned
    }
}

enum Replay {
    Synced,
    Retrying,
    Abandoned,
}

/// Orchestrates writes, reads, and queue replay.
pub struct SyncEngine<R, C> {
    db: Arc<Database>,
    store: LocalStore,
    queue: OperationQueue,
    remote: R,
    credentials: C,
    connectivity: Arc<ConnectivityMonitor>,
    config: EngineConfig,
}

impl<R, C> SyncEngine<R, C>
where
    R: RemoteClient,
    C: CredentialProvider,
{
    /// Build an engine over `db`. Claims left behind by an interrupted drain
    /// are recovered first.
    pub fn new(
        db: Arc<Database>,
        remote: R,
        credentials: C,
        connectivity: Arc<ConnectivityMonitor>,
        config: EngineConfig,
    ) -> Result<Self> {
        let store = LocalStore::new(Arc::clone(&db));
        let queue = OperationQueue::with_retry_ceiling(Arc::clone(&db), config.retry_ceiling);
        let stale_after = chrono::Duration::from_std(config.stale_claim_after)
            .unwrap_or_else(|_| chrono::Duration::zero());
        queue.recover_stale(stale_after)?;

        Ok(SyncEngine {
            db,
            store,
            queue,
            remote,
            credentials,
            connectivity,
            config,
        })
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn queue(&self) -> &OperationQueue {
        &self.queue
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Apply a mutation, remotely if possible and through the queue otherwise.
    ///
    /// Fails only for rejections (`RemoteRejected`) and local storage errors.
    pub async fn write(&self, mutation: Mutation) -> Result<WriteOutcome> {
        if let Mutation::Delete { collection, target } = &mutation {
            if self.collapse(&ResourceRef::new(*collection, target.clone()))? {
                tracing::info!("delete of {}/{} cancelled its queued create", collection, target);
                return Ok(WriteOutcome::Collapsed);
            }
        }

        if self.must_queue(&mutation)? {
            return self.write_offline(mutation);
        }
        let Some(credential) = self.credentials.token() else {
            tracing::debug!("no credential, queueing {}", mutation.kind());
            return self.write_offline(mutation);
        };

        let (method, endpoint) = match &mutation {
            Mutation::Create(entity) => (Method::Post, entity.collection().endpoint()),
            Mutation::Update { target, entity } => {
                (Method::Put, entity.collection().resource_endpoint(target.as_str()))
            }
            Mutation::Delete { collection, target } => {
                (Method::Delete, collection.resource_endpoint(target.as_str()))
            }
        };
        let payload = mutation.entity().map(Entity::to_body).transpose()?;

        match self.send(method, endpoint, payload, credential).await {
            Ok(body) => {
                let collection = mutation.collection();
                let outcome = self.apply_direct(mutation, body)?;
                if collection == Collection::Transactions {
                    self.refresh_accounts().await;
                }
                Ok(outcome)
            }
            Err(e) if e.is_transient() => {
                tracing::warn!("{} failed, queueing: {}", mutation.kind(), e);
                self.write_offline(mutation)
            }
            Err(e) => Err(e),
        }
    }

    /// Writes that the remote cannot take right now without reordering or
    /// dangling references.
    fn must_queue(&self, mutation: &Mutation) -> Result<bool> {
        if !self.connectivity.is_online() {
            return Ok(true);
        }
        if let Some(target) = mutation.target() {
            if target.identity.is_provisional() || self.queue.has_unsettled(&target)? {
                return Ok(true);
            }
        }
        if let Some(entity) = mutation.entity() {
            for id in entity.references() {
                if self.queue.awaits_create(id)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn apply_direct(&self, mutation: Mutation, body: Value) -> Result<WriteOutcome> {
        let record = match mutation {
            Mutation::Create(entity) => {
                let record = Record::from_remote(entity.collection(), body)?;
                self.store.put(&record)?;
                Some(record)
            }
            Mutation::Update { target, entity } => {
                let record = authoritative(entity.collection(), target, entity, body)?;
                self.store.put(&record)?;
                Some(record)
            }
            Mutation::Delete { collection, target } => {
                self.store.delete(collection, &target)?;
                None
            }
        };
        Ok(WriteOutcome::Reconciled { record })
    }

    /// Record the write locally and append it to the queue, atomically.
    fn write_offline(&self, mutation: Mutation) -> Result<WriteOutcome> {
        let kind = mutation.kind();
        let (sequence, record) = self.db.transaction(|tx| match mutation {
            Mutation::Create(entity) => {
                let record = Record::new(Identity::provisional(), SyncStatus::Pending, entity);
                store::put_in(tx, &record)?;
                let target = ResourceRef::new(record.collection(), record.identity.clone());
                let seq = queue::enqueue_in(tx, OperationKind::Create, &target, Some(&record.entity))?;
                Ok((seq, Some(record)))
            }
            Mutation::Update { target, entity } => {
                let collection = entity.collection();
                if target.is_provisional()
                    && store::get_in(tx, collection, target.as_str())?.is_none()
                {
                    return Err(Error::NotFound {
                        collection: collection.to_string(),
                        id: target.to_string(),
                    });
                }
                let record = Record::new(target, SyncStatus::Pending, entity);
                store::put_in(tx, &record)?;
                let target = ResourceRef::new(collection, record.identity.clone());
                let seq = queue::enqueue_in(tx, OperationKind::Update, &target, Some(&record.entity))?;
                Ok((seq, Some(record)))
            }
            Mutation::Delete { collection, target } => {
                store::delete_in(tx, collection, target.as_str())?;
                let target = ResourceRef::new(collection, target);
                let seq = queue::enqueue_in(tx, OperationKind::Delete, &target, None)?;
                Ok((seq, None))
            }
        })?;
        tracing::info!("queued {} as #{}", kind, sequence);
        Ok(WriteOutcome::Queued { sequence, record })
    }

    /// A delete of a record whose create is still waiting in the queue never
    /// needs to reach the remote. Returns true if the delete was absorbed.
    fn collapse(&self, target: &ResourceRef) -> Result<bool> {
        if !target.identity.is_provisional() {
            return Ok(false);
        }
        self.db.transaction(|tx| {
            if !queue::has_pending_create_in(tx, target)? {
                return Ok(false);
            }
            queue::cancel_target_in(tx, target)?;
            store::delete_in(tx, target.collection, target.identity.as_str())?;
            let orphans = queue::abandon_dependents_in(
                tx,
                target.identity.as_str(),
                &format!("referenced record {target} was deleted before sync"),
            )?;
            for entry in &orphans {
                mark_record_failed(tx, entry)?;
            }
            Ok(true)
        })
    }

    /// Fetch a collection, falling back to the cached snapshot.
    pub async fn read(&self, collection: Collection) -> Result<ReadOutcome> {
        self.fetch(collection, None).await
    }

    /// Fetch the transactions matching `filter`. The remote applies the
    /// filter; when it cannot be reached the cache is filtered instead.
    ///
    /// A filtered listing is partial, so it refreshes the cached rows it
    /// returns but never drops the others.
    pub async fn read_transactions(&self, filter: &TransactionFilter) -> Result<ReadOutcome> {
        if filter.is_empty() {
            return self.read(Collection::Transactions).await;
        }
        self.fetch(Collection::Transactions, Some(filter)).await
    }

    async fn fetch(
        &self,
        collection: Collection,
        filter: Option<&TransactionFilter>,
    ) -> Result<ReadOutcome> {
        let query = filter.map(TransactionFilter::query).unwrap_or_default();
        let fetched = match self.credentials.token() {
            Some(credential) if self.connectivity.is_online() => {
                self.send_query(Method::Get, collection.endpoint(), query, None, credential)
                    .await
            }
            Some(_) => Err(Error::NetworkUnavailable("device is offline".into())),
            None => Err(Error::NetworkUnavailable("no credential".into())),
        };

        match fetched {
            Ok(body) => {
                let records = self.merge_snapshot(collection, body, filter)?;
                Ok(ReadOutcome {
                    records,
                    stale: false,
                })
            }
            Err(e) if e.is_transient() => {
                tracing::debug!("serving cached {}: {}", collection, e);
                let records = match filter {
                    Some(filter) => self.store.scan_where(collection, |r| filter.admits(r))?,
                    None => self.store.scan(collection)?,
                };
                Ok(ReadOutcome {
                    records,
                    stale: true,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Account balances are computed remotely, so a reconciled transaction
    /// write leaves the cached accounts behind.
    async fn refresh_accounts(&self) {
        match self.read(Collection::Accounts).await {
            Ok(outcome) if !outcome.stale => {
                tracing::debug!("refreshed {} accounts", outcome.records.len());
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("account refresh failed: {}", e),
        }
    }

    /// Combine server data with unsettled local writes.
    ///
    /// An unfiltered listing replaces the cached snapshot. A filtered one
    /// only updates the rows it returned, and local records join the result
    /// only when they pass the filter.
    fn merge_snapshot(
        &self,
        collection: Collection,
        body: Value,
        filter: Option<&TransactionFilter>,
    ) -> Result<Vec<Record>> {
        let Value::Array(items) = body else {
            return Err(Error::CorruptedData(format!(
                "expected a list of {collection}"
            )));
        };
        let server = items
            .into_iter()
            .map(|item| Record::from_remote(collection, item))
            .collect::<Result<Vec<_>>>()?;
        let admits = |record: &Record| filter.is_none_or(|f| f.admits(record));

        self.db.transaction(|tx| {
            let mut deleted: HashSet<String> = HashSet::new();
            let mut failed_deletes: HashSet<String> = HashSet::new();
            let mut local: HashSet<String> = HashSet::new();
            for entry in queue::unsettled_in(tx, collection)? {
                let id = entry.target.identity.as_str().to_string();
                match (entry.kind, entry.status) {
                    (OperationKind::Delete, EntryStatus::Failed) => {
                        failed_deletes.insert(id);
                    }
                    (OperationKind::Delete, _) => {
                        deleted.insert(id);
                    }
                    _ => {
                        local.insert(id);
                    }
                }
            }

            let cached = store::scan_in(tx, collection)?;
            let mut merged = Vec::with_capacity(server.len());
            let mut seen: HashSet<String> = HashSet::new();
            for mut record in server {
                let id = record.identity.as_str().to_string();
                if deleted.contains(&id) {
                    continue;
                }
                if local.contains(&id) {
                    if let Some(mine) = cached.iter().find(|r| r.identity.as_str() == id) {
                        record = mine.clone();
                    }
                    seen.insert(id);
                    if admits(&record) {
                        merged.push(record);
                    }
                    continue;
                }
                if failed_deletes.contains(&id) {
                    record.sync_status = SyncStatus::Failed;
                }
                if filter.is_some() {
                    store::put_in(tx, &record)?;
                }
                seen.insert(id);
                merged.push(record);
            }
            for record in cached {
                let id = record.identity.as_str();
                if local.contains(id) && !seen.contains(id) && admits(&record) {
                    merged.push(record);
                }
            }

            if filter.is_none() {
                store::replace_in(tx, collection, &merged)?;
            }
            Ok(merged)
        })
    }

    /// Replay queued entries until the queue has nothing left to try in this
    /// cycle, a call finds the remote unreachable, or `cancel` fires.
    ///
    /// Each entry is attempted at most once per drain. Cancellation is checked
    /// between entries; claimed entries not yet sent go back to pending.
    pub async fn drain(&self, cancel: &CancellationToken) -> Result<DrainReport> {
        let mut report = DrainReport::default();
        let mut attempted: HashSet<i64> = HashSet::new();
        let mut touched_transactions = false;

        'cycle: loop {
            if cancel.is_cancelled() {
                report.stopped = Some(DrainStop::Cancelled);
                break;
            }
            let Some(credential) = self.credentials.token() else {
                tracing::debug!("no credential, drain skipped");
                report.stopped = Some(DrainStop::NoCredential);
                break;
            };

            let batch = self.queue.claim_batch(self.config.batch_size, &attempted)?;
            if batch.is_empty() {
                break;
            }

            let mut entries = batch.into_iter();
            while let Some(entry) = entries.next() {
                if cancel.is_cancelled() {
                    report.released += self.release_all(std::iter::once(entry).chain(entries))?;
                    report.stopped = Some(DrainStop::Cancelled);
                    break 'cycle;
                }
                attempted.insert(entry.sequence);

                let (replay, unreachable) = self.replay(&entry, &credential).await?;
                match replay {
                    Replay::Synced => {
                        report.synced += 1;
                        touched_transactions |= entry.target.collection == Collection::Transactions;
                    }
                    Replay::Retrying => report.retrying += 1,
                    Replay::Abandoned => report.abandoned += 1,
                }
                if unreachable {
                    report.released += self.release_all(entries)?;
                    report.stopped = Some(DrainStop::Offline);
                    break 'cycle;
                }
            }
        }

        if touched_transactions && report.stopped.is_none() {
            self.refresh_accounts().await;
        }
        if report.attempted() > 0 || report.stopped.is_some() {
            tracing::info!(
                "drain: {} synced, {} retrying, {} abandoned{}",
                report.synced,
                report.retrying,
                report.abandoned,
                match report.stopped {
                    Some(stop) => format!(" (stopped: {stop:?})"),
                    None => String::new(),
                }
            );
        }
        Ok(report)
    }

    /// Drain with no way to cancel.
    pub async fn drain_now(&self) -> Result<DrainReport> {
        self.drain(&CancellationToken::new()).await
    }

    fn release_all(&self, entries: impl Iterator<Item = QueueEntry>) -> Result<usize> {
        let mut released = 0;
        for entry in entries {
            self.queue.release(entry.sequence)?;
            released += 1;
        }
        Ok(released)
    }

    /// Send one entry. The flag is set when no response arrived at all.
    async fn replay(&self, entry: &QueueEntry, credential: &str) -> Result<(Replay, bool)> {
        let target = &entry.target;
        let (method, endpoint) = match entry.kind {
            OperationKind::Create => (Method::Post, target.collection.endpoint()),
            OperationKind::Update => (
                Method::Put,
                target.collection.resource_endpoint(target.identity.as_str()),
            ),
            OperationKind::Delete => (
                Method::Delete,
                target.collection.resource_endpoint(target.identity.as_str()),
            ),
        };
        let payload = entry.payload.as_ref().map(Entity::to_body).transpose()?;

        let sent = match self
            .send(method, endpoint, payload, credential.to_string())
            .await
        {
            // Already gone remotely is as good as deleted
            Err(Error::RemoteRejected { status: 404, .. }) if entry.kind == OperationKind::Delete => {
                Ok(Value::Null)
            }
            other => other,
        };
        let failure = match sent {
            Ok(body) => match self.settle(entry, body) {
                Ok(()) => return Ok((Replay::Synced, false)),
                // The remote took it but answered with something unusable;
                // resending would duplicate the write.
                Err(e @ (Error::CorruptedData(_) | Error::Json(_))) => e,
                Err(e) => {
                    self.queue.release(entry.sequence)?;
                    return Err(e);
                }
            },
            Err(e @ (Error::StorageUnavailable(_) | Error::Json(_))) => {
                self.queue.release(entry.sequence)?;
                return Err(e);
            }
            Err(e) => e,
        };

        let retry_again = failure.is_transient();
        let unreachable = failure.is_transport();
        let message = failure.to_string();
        let replay = match self.queue.mark_failed(entry.sequence, retry_again, &message)? {
            FailOutcome::Retrying { attempt_count } => {
                tracing::warn!(
                    "#{} {} {} failed (attempt {}): {}",
                    entry.sequence,
                    entry.kind,
                    target,
                    attempt_count,
                    message
                );
                Replay::Retrying
            }
            FailOutcome::Abandoned { attempt_count } => {
                tracing::error!(
                    "#{} {} {} abandoned after {} attempt(s): {}",
                    entry.sequence,
                    entry.kind,
                    target,
                    attempt_count,
                    message
                );
                self.abandon(entry)?;
                Replay::Abandoned
            }
        };
        Ok((replay, unreachable))
    }

    /// Apply an acknowledged entry: drop it from the queue and bring the
    /// local record (and every reference to it) in line with the remote.
    fn settle(&self, entry: &QueueEntry, body: Value) -> Result<()> {
        let target = &entry.target;
        self.db.transaction(|tx| {
            queue::mark_synced_in(tx, entry.sequence)?;
            match entry.kind {
                OperationKind::Create => {
                    let server = Record::from_remote(target.collection, body)?;
                    let remote = server.identity.clone();
                    queue::retarget_in(tx, &target.identity, &remote)?;

                    let moved_target = ResourceRef::new(target.collection, remote.clone());
                    if queue::has_unsettled_in(tx, &moved_target)? {
                        // Newer local edits are still queued; keep them and
                        // only swap the identity.
                        match store::get_in(tx, target.collection, target.identity.as_str())? {
                            Some(mut local) => {
                                local.identity = remote.clone();
                                store::reconcile_identity_in(tx, &target.identity, &local)?;
                            }
                            None => {
                                store::migrate_references_in(
                                    tx,
                                    target.identity.as_str(),
                                    remote.as_str(),
                                )?;
                            }
                        }
                    } else {
                        store::reconcile_identity_in(tx, &target.identity, &server)?;
                    }
                    tracing::info!("{} is now {}", target, remote);
                }
                OperationKind::Update => {
                    if !queue::has_unsettled_in(tx, target)? {
                        if let Some(local) =
                            store::get_in(tx, target.collection, target.identity.as_str())?
                        {
                            let record = authoritative(
                                target.collection,
                                target.identity.clone(),
                                local.entity,
                                body,
                            )?;
                            store::put_in(tx, &record)?;
                        }
                    }
                }
                OperationKind::Delete => {}
            }
            Ok(())
        })
    }

    /// Mark the local record of an abandoned entry failed. An abandoned
    /// create takes every queued write that depends on it down with it.
    fn abandon(&self, entry: &QueueEntry) -> Result<()> {
        self.db.transaction(|tx| {
            mark_record_failed(tx, entry)?;
            if entry.kind == OperationKind::Create {
                let reason = format!("create of {} failed", entry.target);
                for dependent in queue::abandon_dependents_in(tx, entry.target.identity.as_str(), &reason)? {
                    mark_record_failed(tx, &dependent)?;
                }
            }
            Ok(())
        })
    }

    async fn send(
        &self,
        method: Method,
        endpoint: String,
        payload: Option<Value>,
        credential: String,
    ) -> Result<Value> {
        self.send_query(method, endpoint, Vec::new(), payload, credential)
            .await
    }

    async fn send_query(
        &self,
        method: Method,
        endpoint: String,
        query: Vec<(String, String)>,
        payload: Option<Value>,
        credential: String,
    ) -> Result<Value> {
        tracing::debug!("{} {}", method, endpoint);
        let request = RemoteRequest {
            method,
            endpoint,
            query,
            payload,
            credential,
        };
        let timeout = self.config.call_timeout;
        let response = tokio::time::timeout(timeout, self.remote.call(request))
            .await
            .map_err(|_| {
                Error::NetworkTimeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
            })??;
        response.into_result()
    }

    /// Entries waiting to reach the remote.
    pub fn pending_count(&self) -> Result<usize> {
        self.queue.pending_count()
    }

    /// Entries that will not be retried without intervention.
    pub fn failed_entries(&self) -> Result<Vec<QueueEntry>> {
        self.queue.failed_entries()
    }

    /// Give a failed entry a fresh attempt budget.
    pub fn retry_failed(&self, sequence: i64) -> Result<()> {
        let entry = self
            .queue
            .get(sequence)?
            .ok_or(Error::EntryNotFound(sequence))?;
        self.queue.retry_failed(sequence)?;
        if entry.kind != OperationKind::Delete {
            self.store
                .set_status(entry.target.collection, &entry.target.identity, SyncStatus::Pending)?;
        }
        Ok(())
    }

    /// Drop a failed entry. A discarded create also removes its local record;
    /// other local records stay as they are, marked failed.
    pub fn discard(&self, sequence: i64) -> Result<QueueEntry> {
        let entry = self.queue.discard(sequence)?;
        if entry.kind == OperationKind::Create {
            self.store
                .delete(entry.target.collection, &entry.target.identity)?;
        }
        tracing::info!("discarded #{} {} {}", entry.sequence, entry.kind, entry.target);
        Ok(entry)
    }

    /// Watch connectivity transitions.
    pub fn subscribe_connectivity<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.connectivity.subscribe(callback)
    }
}

impl<R, C> SyncEngine<R, C>
where
    R: RemoteClient + 'static,
    C: CredentialProvider + 'static,
{
    /// Drain in the background on every offline → online transition and
    /// every `interval` while online, until `cancel` fires.
    pub fn spawn_auto_drain(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let mut online = engine.connectivity.watch();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = online.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if !*online.borrow_and_update() {
                            continue;
                        }
                        tracing::info!("back online, draining");
                    }
                    _ = tick.tick() => {
                        if !engine.connectivity.is_online() {
                            continue;
                        }
                    }
                }

                if let Err(e) = engine.drain(&cancel).await {
                    tracing::error!("background drain failed: {}", e);
                }
            }
            tracing::debug!("auto-drain stopped");
        })
    }
}

/// The record the remote says exists after a write: its body when it
/// carries an id, otherwise the entity we sent.
fn authoritative(
    collection: Collection,
    identity: Identity,
    sent: Entity,
    body: Value,
) -> Result<Record> {
    if remote_id(&body).is_some() {
        return Record::from_remote(collection, body);
    }
    Ok(Record::new(identity, SyncStatus::Synced, sent))
}

fn mark_record_failed(conn: &rusqlite::Connection, entry: &QueueEntry) -> Result<()> {
    if entry.kind == OperationKind::Delete {
        return Ok(());
    }
    store::set_status_in(
        conn,
        entry.target.collection,
        entry.target.identity.as_str(),
        SyncStatus::Failed,
    )
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;

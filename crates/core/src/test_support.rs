// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for unit tests: entity builders and an in-memory remote.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Value};

use crate::entity::{Account, Category, Entity, Transaction, TxType};
use crate::error::{Error, Result};
use crate::remote::{Method, RemoteClient, RemoteRequest, RemoteResponse};

pub fn account(name: &str) -> Entity {
    Entity::Account(Account {
        name: name.to_string(),
        account_type: "checking".to_string(),
        balance: 0.0,
        icon: None,
        color: None,
    })
}

pub fn category(name: &str) -> Entity {
    Entity::Category(Category {
        name: name.to_string(),
        category_type: Some("expense".to_string()),
        icon: None,
        color: None,
    })
}

pub fn expense(account_id: &str, amount: f64) -> Entity {
    Entity::Transaction(Transaction {
        account_id: Some(account_id.to_string()),
        category_id: None,
        amount,
        tx_date: Some("2026-03-01".to_string()),
        description: None,
        tx_type: TxType::Expense,
        is_recurring: false,
        tags: vec![],
    })
}

/// Next behaviour of the mock remote.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, Value),
    /// No response at all.
    Unreachable,
    /// Never answers; the caller's timeout has to fire.
    Hang,
}

/// In-memory REST store with scriptable failures.
///
/// Unscripted calls are served from a per-collection list of JSON objects,
/// assigning `srv-N` ids to created records.
pub struct MockRemote {
    script: Mutex<VecDeque<Reply>>,
    unreachable: AtomicBool,
    latency: Option<Duration>,
    calls: Mutex<Vec<RemoteRequest>>,
    server: Mutex<BTreeMap<String, Vec<Value>>>,
    next_id: AtomicU64,
    active: Mutex<HashMap<String, usize>>,
    overlapped: AtomicBool,
}

impl MockRemote {
    pub fn new() -> Self {
        MockRemote {
            script: Mutex::new(VecDeque::new()),
            unreachable: AtomicBool::new(false),
            latency: None,
            calls: Mutex::new(Vec::new()),
            server: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            active: Mutex::new(HashMap::new()),
            overlapped: AtomicBool::new(false),
        }
    }

    /// Every call sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue replies consumed one per call, ahead of normal serving.
    pub fn script(&self, replies: impl IntoIterator<Item = Reply>) {
        self.script.lock().unwrap().extend(replies);
    }

    /// Make unscripted calls fail as if the network were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Put a record straight into the server's collection.
    pub fn seed(&self, collection: &str, record: Value) {
        self.server
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(record);
    }

    pub fn records(&self, collection: &str) -> Vec<Value> {
        self.server
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<RemoteRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// `METHOD endpoint` of every call, in order.
    pub fn call_log(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| format!("{} {}", c.method, c.endpoint))
            .collect()
    }

    /// True if two calls to one endpoint were ever in progress together.
    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }

    fn enter(&self, endpoint: &str) {
        let mut active = self.active.lock().unwrap();
        let count = active.entry(endpoint.to_string()).or_insert(0);
        *count += 1;
        if *count > 1 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
    }

    fn leave(&self, endpoint: &str) {
        if let Some(count) = self.active.lock().unwrap().get_mut(endpoint) {
            *count = count.saturating_sub(1);
        }
    }

    fn serve(&self, request: &RemoteRequest) -> RemoteResponse {
        let mut parts = request.endpoint.trim_start_matches('/').splitn(2, '/');
        let collection = parts.next().unwrap_or_default().to_string();
        let id = parts.next().map(str::to_string);
        let mut server = self.server.lock().unwrap();
        let rows = server.entry(collection).or_default();
        let position = id
            .as_ref()
            .and_then(|id| rows.iter().position(|r| r["id"] == json!(id)));

        match (request.method, id, position) {
            (Method::Get, None, _) => RemoteResponse::new(200, Value::Array(rows.clone())),
            (Method::Post, None, _) => {
                let mut body = request.payload.clone().unwrap_or_else(|| json!({}));
                let id = format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
                body["id"] = json!(id);
                rows.push(body.clone());
                RemoteResponse::new(201, body)
            }
            (Method::Get, Some(_), Some(pos)) => RemoteResponse::new(200, rows[pos].clone()),
            (Method::Put, Some(id), Some(pos)) => {
                let mut body = request.payload.clone().unwrap_or_else(|| json!({}));
                body["id"] = json!(id);
                rows[pos] = body.clone();
                RemoteResponse::new(200, body)
            }
            (Method::Delete, Some(_), Some(pos)) => {
                rows.remove(pos);
                RemoteResponse::new(204, Value::Null)
            }
            _ => RemoteResponse::new(404, json!({"detail": "not found"})),
        }
    }
}

impl RemoteClient for MockRemote {
    fn call(
        &self,
        request: RemoteRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RemoteResponse>> + Send + '_>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(request.clone());
            self.enter(&request.endpoint);
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }

            let reply = self.script.lock().unwrap().pop_front();
            let result = match reply {
                Some(Reply::Status(status, body)) => Ok(RemoteResponse::new(status, body)),
                Some(Reply::Unreachable) => {
                    Err(Error::NetworkUnavailable("connection refused".into()))
                }
                Some(Reply::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(Error::NetworkUnavailable("hung call returned".into()))
                }
                None if self.unreachable.load(Ordering::SeqCst) => {
                    Err(Error::NetworkUnavailable("connection refused".into()))
                }
                None => Ok(self.serve(&request)),
            };
            self.leave(&request.endpoint);
            result
        })
    }
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Interfaces to the remote REST store.
//!
//! The engine never talks HTTP directly. It hands a [`RemoteRequest`] to a
//! [`RemoteClient`] and classifies the [`RemoteResponse`] status itself, so
//! implementations only need to report whether a response arrived at all.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::error::{Error, Result};

/// HTTP verb of a remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single request to the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub method: Method,
    /// Path relative to the API base, e.g. `/accounts/7`.
    pub endpoint: String,
    /// Query parameters, in order.
    pub query: Vec<(String, String)>,
    pub payload: Option<Value>,
    /// Bearer token.
    pub credential: String,
}

/// A response that reached us, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: Value,
}

impl RemoteResponse {
    pub fn new(status: u16, body: Value) -> Self {
        RemoteResponse { status, body }
    }

    /// Turn the response into its body or the error its status implies.
    pub fn into_result(self) -> Result<Value> {
        match classify_status(self.status) {
            StatusClass::Success => Ok(self.body),
            StatusClass::Retryable => Err(Error::RemoteServerError {
                status: self.status,
                message: error_message(&self.body),
            }),
            StatusClass::Rejected => Err(Error::RemoteRejected {
                status: self.status,
                message: error_message(&self.body),
            }),
        }
    }
}

/// How a response status affects the write that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// Worth retrying later: 408, 429, and every 5xx.
    Retryable,
    /// The request itself is wrong; retrying cannot help.
    Rejected,
}

pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        408 | 429 => StatusClass::Retryable,
        500..=599 => StatusClass::Retryable,
        _ => StatusClass::Rejected,
    }
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"detail": ...}` and `{"message": ...}`; anything else is
/// rendered as compact JSON.
fn error_message(body: &Value) -> String {
    for key in ["detail", "message", "error"] {
        if let Some(text) = body.get(key).and_then(Value::as_str) {
            return text.to_string();
        }
    }
    match body {
        Value::Null => String::from("no details"),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Performs remote calls.
///
/// Implementations return `Ok` for every response that arrived (including
/// 4xx and 5xx) and `Err(Error::NetworkUnavailable)` when none did.
/// Timeouts are enforced by the caller.
pub trait RemoteClient: Send + Sync {
    fn call(
        &self,
        request: RemoteRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RemoteResponse>> + Send + '_>>;
}

/// Source of the bearer token.
pub trait CredentialProvider: Send + Sync {
    /// Current token, or `None` when the user is signed out.
    fn token(&self) -> Option<String>;
}

/// Fixed token, or none at all.
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(Option<String>);

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        StaticCredential(Some(token.into()))
    }

    pub fn none() -> Self {
        StaticCredential(None)
    }
}

impl CredentialProvider for StaticCredential {
    fn token(&self) -> Option<String> {
        self.0.clone().filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;

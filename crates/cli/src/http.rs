// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! reqwest-backed [`RemoteClient`] for the REST store.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;
use tally_core::{Method, RemoteClient, RemoteRequest, RemoteResponse};

use crate::config::RemoteConfig;
use crate::error::{Error, Result};

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// HTTP client for `{base}/{collection}[/{id}]`.
///
/// Without a configured base every call fails as unreachable, so writes
/// queue locally until a remote is added.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: Option<String>,
    timeout: Duration,
}

impl HttpRemote {
    pub fn new(remote: Option<&RemoteConfig>) -> Result<Self> {
        let timeout = remote
            .map(RemoteConfig::timeout)
            .unwrap_or(Duration::from_secs(10));
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .user_agent(concat!("tally/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(HttpRemote {
            client,
            base_url: remote.map(|r| r.url.trim_end_matches('/').to_string()),
            timeout,
        })
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    fn url_for(&self, endpoint: &str) -> Option<String> {
        self.base_url
            .as_ref()
            .map(|base| format!("{}/{}", base, endpoint.trim_start_matches('/')))
    }

    /// Connectivity reading: true if the base url answers at all, whatever
    /// the status.
    pub async fn probe(&self) -> bool {
        let Some(base) = self.base_url.as_deref() else {
            return false;
        };
        match self.client.get(base).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) => {
                tracing::debug!("probe {} -> {}", base, response.status());
                true
            }
            Err(e) => {
                tracing::debug!("probe {} failed: {}", base, e);
                false
            }
        }
    }

    async fn send(&self, request: RemoteRequest) -> tally_core::Result<RemoteResponse> {
        let url = self
            .url_for(&request.endpoint)
            .ok_or_else(|| tally_core::Error::NetworkUnavailable("no remote configured".into()))?;

        let mut builder = self.client.request(http_method(request.method), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if !request.credential.is_empty() {
            builder = builder.bearer_auth(&request.credential);
        }
        if let Some(payload) = &request.payload {
            builder = builder.json(payload);
        }

        tracing::debug!("{} {}", request.method, url);
        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(&e, self.timeout))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(&e, self.timeout))?;
        tracing::debug!("{} {} -> {}", request.method, url, status);
        Ok(RemoteResponse::new(status, parse_body(&text)))
    }
}

impl RemoteClient for HttpRemote {
    fn call(
        &self,
        request: RemoteRequest,
    ) -> Pin<Box<dyn Future<Output = tally_core::Result<RemoteResponse>> + Send + '_>> {
        Box::pin(self.send(request))
    }
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn transport_error(err: &reqwest::Error, timeout: Duration) -> tally_core::Error {
    if err.is_timeout() {
        tally_core::Error::NetworkTimeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
    } else {
        tally_core::Error::NetworkUnavailable(err.to_string())
    }
}

/// Empty bodies become null; non-JSON text is kept as a string so error
/// messages survive.
fn parse_body(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;

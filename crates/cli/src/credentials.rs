// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer token lookup for the remote store.

use tally_core::CredentialProvider;

use crate::config::RemoteConfig;

/// Reads the token from an environment variable at call time, falling back
/// to the inline token from config.
#[derive(Debug, Clone, Default)]
pub struct TokenSource {
    env_var: Option<String>,
    inline: Option<String>,
}

impl TokenSource {
    pub fn new(env_var: Option<String>, inline: Option<String>) -> Self {
        TokenSource { env_var, inline }
    }

    pub fn from_config(remote: Option<&RemoteConfig>) -> Self {
        match remote {
            Some(remote) => TokenSource::new(Some(remote.token_env.clone()), remote.token.clone()),
            None => TokenSource::default(),
        }
    }
}

impl CredentialProvider for TokenSource {
    fn token(&self) -> Option<String> {
        let from_env = self
            .env_var
            .as_deref()
            .filter(|name| !name.is_empty())
            .and_then(|name| std::env::var(name).ok());
        from_env
            .or_else(|| self.inline.clone())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;

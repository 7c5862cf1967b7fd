// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;

pub use httpmock::Method::{DELETE, GET, POST, PUT};
pub use httpmock::MockServer;
pub use predicates::prelude::*;
pub use serde_json::json;
pub use tempfile::TempDir;

/// Nothing listens here, so every call is refused.
pub const DEAD_REMOTE: &str = "http://127.0.0.1:9";

pub fn tally() -> Command {
    let mut cmd = cargo_bin_cmd!("tally");
    cmd.env_remove("RUST_LOG").env("TALLY_TOKEN", "test-token");
    cmd
}

/// Helper to create an initialized temp directory with no remote
pub fn init_temp() -> TempDir {
    let temp = TempDir::new().unwrap();
    tally()
        .arg("init")
        .current_dir(temp.path())
        .assert()
        .success();
    temp
}

/// Helper to create an initialized temp directory pointing at `url`
pub fn init_temp_remote(url: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    tally()
        .args(["init", "--remote", url])
        .current_dir(temp.path())
        .assert()
        .success();
    temp
}

/// Point an existing project at a different remote.
pub fn set_remote(temp: &TempDir, url: &str) {
    let path = temp.path().join(".tally/config.toml");
    std::fs::write(path, format!("[remote]\nurl = \"{url}\"\ntimeout_ms = 2000\n")).unwrap();
}

/// Helper to create a record and return its id
pub fn create(temp: &TempDir, collection: &str, json: &str) -> String {
    let output = tally()
        .args(["create", collection, "--json", json])
        .current_dir(temp.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "{:?}", output);

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let reference = stdout
        .split_whitespace()
        .find(|s| s.starts_with(&format!("{collection}/")))
        .unwrap();
    reference[collection.len() + 1..].to_string()
}

pub fn stdout_of(temp: &TempDir, args: &[&str]) -> String {
    let output = tally().args(args).current_dir(temp.path()).output().unwrap();
    assert!(output.status.success(), "{:?}", output);
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn json_of(temp: &TempDir, args: &[&str]) -> Value {
    serde_json::from_str(&stdout_of(temp, args)).unwrap()
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tallyrs - command-line front end for the tally sync engine.
//!
//! This crate wires [`tally_core::SyncEngine`] to a real environment: a
//! `.tally/` project directory with its config and SQLite cache, a reqwest
//! client for the REST store, bearer tokens from config or the environment,
//! and a connectivity probe.
//!
//! # Main Components
//!
//! - [`Config`] - Project configuration (`[remote]` and `[sync]` sections)
//! - [`HttpRemote`] - HTTP implementation of [`tally_core::RemoteClient`]
//! - [`TokenSource`] - [`tally_core::CredentialProvider`] over env and config
//! - [`Error`] - Error types for all operations

mod cli;
mod commands;

pub mod config;
pub mod credentials;
pub mod error;
pub mod http;

pub use cli::{Cli, Command, OutputFormat, QueueCommand};
pub use config::{find_work_dir, get_db_path, get_log_path, init_work_dir, Config};
pub use credentials::TokenSource;
pub use error::{Error, Result};
pub use http::HttpRemote;

pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Init { remote } => commands::init::run(remote),
        Command::Create { collection, json } => commands::write::create(&collection, &json),
        Command::Update {
            collection,
            id,
            json,
        } => commands::write::update(&collection, &id, &json),
        Command::Delete { collection, id } => commands::write::delete(&collection, &id),
        Command::List {
            collection,
            filter,
            output,
        } => commands::list::run(&collection, filter.into(), output),
        Command::Sync { watch } => commands::sync::run(watch),
        Command::Status { output } => commands::status::run(output),
        Command::Queue(cmd) => match cmd {
            QueueCommand::List { output } => commands::queue::list(output),
            QueueCommand::Failed { output } => commands::queue::failed(output),
            QueueCommand::Retry { sequence } => commands::queue::retry(sequence),
            QueueCommand::Discard { sequence } => commands::queue::discard(sequence),
        },
    }
}

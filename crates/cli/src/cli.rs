// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use clap::{Args, Parser, Subcommand, ValueEnum};
use tally_core::TransactionFilter;

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

const QUICKSTART_HELP: &str = "\
Get started:
  tally init --remote https://api.example.com     Set up a local cache
  tally create accounts --json '{\"name\": \"Wallet\", \"account_type\": \"cash\"}'
  tally list accounts                              Show accounts (cached when offline)
  tally sync                                       Push queued changes";

#[derive(Parser)]
#[command(name = "tally")]
#[command(version)]
#[command(about = "Offline-first personal finance records with a durable sync queue")]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a cache in the current directory
    Init {
        /// Base url of the REST store (omit to keep everything queued)
        #[arg(long)]
        remote: Option<String>,
    },

    /// Create a record
    #[command(after_help = "Examples:\n  \
        tally create accounts --json '{\"name\": \"Wallet\", \"account_type\": \"cash\"}'\n  \
        tally create transactions --json '{\"amount\": 12.5, \"tx_type\": \"expense\", \"account_id\": \"srv-1\"}'")]
    Create {
        /// Collection (accounts, categories, transactions)
        collection: String,

        /// Record fields as a JSON object
        #[arg(long)]
        json: String,
    },

    /// Replace a record's fields
    Update {
        /// Collection (accounts, categories, transactions)
        collection: String,

        /// Record id (remote or local-*)
        id: String,

        /// Record fields as a JSON object
        #[arg(long)]
        json: String,
    },

    /// Delete a record
    Delete {
        /// Collection (accounts, categories, transactions)
        collection: String,

        /// Record id (remote or local-*)
        id: String,
    },

    /// List records, from the remote when reachable and the cache otherwise
    #[command(after_help = "Examples:\n  \
        tally list transactions --from 2026-03-01 --to 2026-03-31\n  \
        tally list transactions --account srv-1 --search rent")]
    List {
        /// Collection (accounts, categories, transactions)
        collection: String,

        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Replay queued changes against the remote
    Sync {
        /// Keep running: drain on reconnect and every sync.drain_interval_secs
        #[arg(long)]
        watch: bool,
    },

    /// Show remote, connectivity and queue counts
    Status {
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Inspect and repair the operation queue
    #[command(subcommand)]
    Queue(QueueCommand),
}

/// Transaction filters for `list`.
#[derive(Args, Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterArgs {
    /// Only transactions on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// Only transactions on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,

    /// Only transactions of this account
    #[arg(long)]
    pub account: Option<String>,

    /// Match description or tags (case-insensitive)
    #[arg(long, short)]
    pub search: Option<String>,
}

impl From<FilterArgs> for TransactionFilter {
    fn from(args: FilterArgs) -> Self {
        TransactionFilter {
            start_date: args.from,
            end_date: args.to,
            account_id: args.account,
            search: args.search,
        }
    }
}

#[derive(Subcommand)]
pub enum QueueCommand {
    /// List every queued entry
    List {
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// List entries that gave up
    Failed {
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Put a failed entry back in line with a fresh attempt budget
    Retry {
        /// Queue sequence number
        sequence: i64,
    },

    /// Drop a failed entry (a discarded create also removes its local record)
    Discard {
        /// Queue sequence number
        sequence: i64,
    },
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;

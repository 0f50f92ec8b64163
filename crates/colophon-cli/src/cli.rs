//! CLI argument definitions for Colophon.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `search` | Run a discovery query across metadata providers |
//! | `reconcile` | Merge provider records into one reconciled preview |
//! | `duplicates` | Screen a candidate entry against catalog entries |
//! | `sources` | List registered providers and their capabilities |
//!
//! # Examples
//!
//! ```bash
//! # Search by title across all providers
//! colophon search --title "The Great Gatsby" --pretty
//!
//! # Offline run against deterministic mock providers
//! colophon search --title Dune --mock
//!
//! # Reconcile previously fetched records
//! colophon reconcile --input records.json --pretty
//!
//! # Screen for duplicates
//! colophon duplicates --candidate new-entry.json --catalog catalog.json
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colophon_core::SelectionStrategy;

/// Provider-neutral bibliographic metadata CLI.
///
/// Queries multiple metadata sources (Open Library, Google Books,
/// Crossref) under rate limits and retries, reconciles their answers,
/// and screens entries for duplicates.
#[derive(Debug, Parser)]
#[command(name = "colophon", author, version, about)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Use deterministic offline mock providers instead of real APIs.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a discovery query across metadata providers.
    Search(SearchArgs),
    /// Merge provider records (JSON file or stdin) into one preview.
    Reconcile(ReconcileArgs),
    /// Screen a candidate entry against existing catalog entries.
    Duplicates(DuplicatesArgs),
    /// List registered providers and their capabilities.
    Sources,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Title to search for.
    #[arg(long)]
    pub title: Option<String>,

    /// Author/creator to search for.
    #[arg(long)]
    pub author: Option<String>,

    /// ISBN to look up.
    #[arg(long)]
    pub isbn: Option<String>,

    /// Provider selection strategy.
    #[arg(long, value_enum, default_value_t = StrategyArg::Priority)]
    pub strategy: StrategyArg,

    /// Cap on the number of providers queried.
    #[arg(long)]
    pub max_providers: Option<usize>,

    /// Preferred result languages (ISO 639-1), highest priority first.
    #[arg(long)]
    pub language: Vec<String>,

    /// Provider names to exclude.
    #[arg(long)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// JSON file holding an array of provider records; stdin when absent.
    #[arg(long)]
    pub input: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DuplicatesArgs {
    /// JSON file holding the candidate entry.
    #[arg(long)]
    pub candidate: PathBuf,

    /// JSON file holding an array of existing catalog entries.
    #[arg(long)]
    pub catalog: PathBuf,

    /// Drop matches below this similarity.
    #[arg(long)]
    pub min_similarity: Option<f64>,
}

/// Selection strategy flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Every eligible provider, by static priority.
    All,
    /// Static priority order.
    Priority,
    /// Historically fastest providers first.
    Fastest,
    /// Reliability-diverse subset for consensus checks.
    Consensus,
}

impl From<StrategyArg> for SelectionStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::All => SelectionStrategy::All,
            StrategyArg::Priority => SelectionStrategy::Priority,
            StrategyArg::Fastest => SelectionStrategy::Fastest,
            StrategyArg::Consensus => SelectionStrategy::Consensus,
        }
    }
}

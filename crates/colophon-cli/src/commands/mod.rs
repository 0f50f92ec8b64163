mod duplicates;
mod reconcile;
mod search;
mod sources;

use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<Value, CliError> {
    match &cli.command {
        Command::Search(args) => search::run(cli, args).await,
        Command::Reconcile(args) => reconcile::run(args),
        Command::Duplicates(args) => duplicates::run(args),
        Command::Sources => sources::run(cli),
    }
}

/// Build the provider registry honoring the global `--mock` flag.
pub(crate) fn build_registry(cli: &Cli) -> colophon_core::ProviderRegistry {
    let builder = colophon_core::RegistryBuilder::new();
    if cli.mock {
        builder.with_mock_mode().build()
    } else {
        builder.with_real_clients().build()
    }
}

use serde_json::Value;

use crate::cli::Cli;
use crate::error::CliError;

pub fn run(cli: &Cli) -> Result<Value, CliError> {
    let registry = super::build_registry(cli);
    Ok(serde_json::to_value(registry.snapshots())?)
}

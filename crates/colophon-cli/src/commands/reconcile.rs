use std::io::Read;

use colophon_core::{FieldInputs, MetadataRecord, ReconcileEngine};
use serde_json::Value;

use crate::cli::ReconcileArgs;
use crate::error::CliError;

pub fn run(args: &ReconcileArgs) -> Result<Value, CliError> {
    let raw = match &args.input {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let records: Vec<MetadataRecord> = serde_json::from_str(&raw)?;
    if records.is_empty() {
        return Err(CliError::Command(String::from(
            "no records to reconcile; input array is empty",
        )));
    }

    let inputs = FieldInputs::from_records(&records);
    let preview = ReconcileEngine::default().reconcile(&inputs);
    Ok(serde_json::to_value(&preview)?)
}

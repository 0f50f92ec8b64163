use colophon_core::{CatalogEntry, DuplicateConfig, DuplicateDetector};
use serde_json::Value;

use crate::cli::DuplicatesArgs;
use crate::error::CliError;

pub fn run(args: &DuplicatesArgs) -> Result<Value, CliError> {
    let candidate: CatalogEntry =
        serde_json::from_str(&std::fs::read_to_string(&args.candidate)?)?;
    let catalog: Vec<CatalogEntry> = serde_json::from_str(&std::fs::read_to_string(&args.catalog)?)?;

    let config = DuplicateConfig {
        min_similarity: args
            .min_similarity
            .unwrap_or(DuplicateConfig::default().min_similarity),
        ..DuplicateConfig::default()
    };

    let matches = DuplicateDetector::new(config).detect(&candidate, &catalog);
    Ok(serde_json::to_value(&matches)?)
}

use std::str::FromStr;
use std::sync::Arc;

use colophon_core::{
    ProviderId, QueryCoordinator, RateLimiterRegistry, SearchQuery, SelectionOptions,
};
use serde_json::Value;

use crate::cli::{Cli, SearchArgs};
use crate::error::CliError;

pub async fn run(cli: &Cli, args: &SearchArgs) -> Result<Value, CliError> {
    let mut query = SearchQuery::default();
    if let Some(title) = &args.title {
        query = query.with_title(title);
    }
    if let Some(author) = &args.author {
        query = query.with_creator(author);
    }
    if let Some(isbn) = &args.isbn {
        query = query.with_isbn(isbn);
    }
    query.validate()?;

    let exclude_providers = args
        .exclude
        .iter()
        .map(|name| ProviderId::from_str(name))
        .collect::<Result<Vec<_>, _>>()?;

    let options = SelectionOptions {
        max_providers: args.max_providers,
        preferred_languages: args.language.clone(),
        exclude_providers,
        ..SelectionOptions::default()
    };

    let registry = Arc::new(super::build_registry(cli));
    let limiters = Arc::new(RateLimiterRegistry::new());
    let coordinator = QueryCoordinator::new(registry, limiters);

    let outcome = coordinator
        .query(&query, args.strategy.into(), &options)
        .await?;
    Ok(serde_json::to_value(&outcome)?)
}

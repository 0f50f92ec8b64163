//! Concurrent query fan-out and aggregation.
//!
//! One tokio task per selected provider; each call is gated by the rate
//! limiter, wrapped in the retry policy, and bounded by the provider's
//! timeout budget. A provider failure never aborts its siblings — it is
//! reported in the per-provider diagnostics and the aggregate is built
//! from whatever succeeded.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::domain::{MetadataRecord, SearchQuery};
use crate::provider::{MetadataProvider, ProviderError, ProviderErrorKind};
use crate::rate_limit::RateLimiterRegistry;
use crate::registry::ProviderRegistry;
use crate::retry::RetryPolicy;
use crate::selection::{
    select_providers, NoHistory, PerformanceHistory, SelectionOptions, SelectionStrategy,
};
use crate::{ProviderId, ValidationError};

/// Diagnostic result of one provider's query, in call-issuance order.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderOutcome {
    pub provider: ProviderId,
    pub success: bool,
    pub duration: Duration,
    /// The provider's own records, before aggregate deduplication.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<MetadataRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated result of one discovery query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    /// Deduplicated union of all successful providers' records, sorted by
    /// descending confidence.
    pub records: Vec<MetadataRecord>,
    pub providers: Vec<ProviderOutcome>,
    pub total_records: usize,
    pub total_duration: Duration,
}

/// Fans queries out to selected providers and aggregates the answers.
pub struct QueryCoordinator {
    registry: Arc<ProviderRegistry>,
    limiters: Arc<RateLimiterRegistry>,
    retry: RetryPolicy,
    history: Arc<dyn PerformanceHistory>,
}

impl QueryCoordinator {
    /// Build a coordinator and seed the limiter registry with every
    /// enabled provider's declared limits.
    pub fn new(registry: Arc<ProviderRegistry>, limiters: Arc<RateLimiterRegistry>) -> Self {
        registry.register_rate_limits(&limiters);
        Self {
            registry,
            limiters,
            retry: RetryPolicy::default(),
            history: Arc::new(NoHistory),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_performance_history(mut self, history: Arc<dyn PerformanceHistory>) -> Self {
        self.history = history;
        self
    }

    /// Run one discovery query. Provider failures are isolated into the
    /// returned diagnostics; only a malformed query is an error.
    pub async fn query(
        &self,
        query: &SearchQuery,
        strategy: SelectionStrategy,
        options: &SelectionOptions,
    ) -> Result<QueryOutcome, ValidationError> {
        query.validate()?;
        let started = Instant::now();

        let selected = select_providers(
            &self.registry.enabled_providers(),
            query,
            strategy,
            options,
            self.history.as_ref(),
        );
        tracing::debug!(
            strategy = strategy.as_str(),
            providers = selected.len(),
            "dispatching discovery query"
        );

        let mut handles = Vec::with_capacity(selected.len());
        for provider in selected {
            let id = provider.id();
            let limiters = Arc::clone(&self.limiters);
            let retry = self.retry;
            let query = query.clone();
            handles.push((
                id,
                tokio::spawn(async move {
                    call_provider(provider, limiters, retry, query).await
                }),
            ));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => ProviderOutcome {
                    provider: id,
                    success: false,
                    duration: Duration::ZERO,
                    records: Vec::new(),
                    error: Some(format!("provider task failed: {join_error}")),
                },
            };
            if !outcome.success {
                tracing::warn!(
                    provider = %outcome.provider,
                    error = outcome.error.as_deref().unwrap_or("unknown"),
                    "provider query failed"
                );
            }
            outcomes.push(outcome);
        }

        let records = aggregate(&outcomes);
        let total_records = records.len();

        Ok(QueryOutcome {
            records,
            providers: outcomes,
            total_records,
            total_duration: started.elapsed(),
        })
    }
}

async fn call_provider(
    provider: Arc<dyn MetadataProvider>,
    limiters: Arc<RateLimiterRegistry>,
    retry: RetryPolicy,
    query: SearchQuery,
) -> ProviderOutcome {
    let id = provider.id();
    let started = Instant::now();

    limiters.wait_for_slot(id.as_str()).await;

    let operation = operation_name(&query);
    let budget = provider.timeout();
    let attempt_provider = Arc::clone(&provider);
    let call = retry.run(operation, move || {
        let provider = Arc::clone(&attempt_provider);
        let query = query.clone();
        async move { provider.search(&query).await }
    });

    let result = tokio::time::timeout(budget, call).await;
    let duration = started.elapsed();

    match result {
        Ok(Ok(records)) => ProviderOutcome {
            provider: id,
            success: true,
            duration,
            records,
            error: None,
        },
        // Not-found is an empty answer, not a failure.
        Ok(Err(error)) if error.kind() == ProviderErrorKind::NotFound => ProviderOutcome {
            provider: id,
            success: true,
            duration,
            records: Vec::new(),
            error: None,
        },
        Ok(Err(error)) => ProviderOutcome {
            provider: id,
            success: false,
            duration,
            records: Vec::new(),
            error: Some(error.to_string()),
        },
        Err(_elapsed) => ProviderOutcome {
            provider: id,
            success: false,
            duration,
            records: Vec::new(),
            error: Some(
                ProviderError::timeout(format!(
                    "provider call exceeded its {}ms budget",
                    budget.as_millis()
                ))
                .for_operation(operation)
                .to_string(),
            ),
        },
    }
}

fn operation_name(query: &SearchQuery) -> &'static str {
    if query.isbn.is_some() {
        "search_by_isbn"
    } else if query.title.is_some() {
        "search_by_title"
    } else if !query.creators.is_empty() {
        "search_by_creator"
    } else {
        "search"
    }
}

/// Union the successful outcomes, drop records whose normalized
/// (title, authors) key was already seen, and sort by descending
/// confidence. First-seen wins on exact key collisions; the stable sort
/// keeps issuance order among equal confidences.
fn aggregate(outcomes: &[ProviderOutcome]) -> Vec<MetadataRecord> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut records: Vec<MetadataRecord> = Vec::new();

    for outcome in outcomes.iter().filter(|outcome| outcome.success) {
        for record in &outcome.records {
            if seen.insert(record.dedup_key()) {
                records.push(record.clone());
            }
        }
    }

    records.sort_by(|left, right| right.confidence.total_cmp(&left.confidence));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{FieldType, ProviderFuture};
    use crate::rate_limit::RateLimitConfig;

    enum Behavior {
        Records(Vec<MetadataRecord>),
        Fail(fn() -> ProviderError),
        NotFound,
        Hang,
    }

    struct ScriptedProvider {
        id: ProviderId,
        behavior: Behavior,
        timeout: Duration,
    }

    impl ScriptedProvider {
        fn returning(id: ProviderId, records: Vec<MetadataRecord>) -> Self {
            Self {
                id,
                behavior: Behavior::Records(records),
                timeout: Duration::from_secs(3),
            }
        }

        fn failing(id: ProviderId, make_error: fn() -> ProviderError) -> Self {
            Self {
                id,
                behavior: Behavior::Fail(make_error),
                timeout: Duration::from_secs(3),
            }
        }
    }

    impl MetadataProvider for ScriptedProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        fn supports_field(&self, _field: FieldType) -> bool {
            true
        }

        fn reliability(&self, _field: FieldType) -> f64 {
            0.8
        }

        fn priority(&self) -> u8 {
            50
        }

        fn languages(&self) -> &[&'static str] {
            &["en"]
        }

        fn rate_limit(&self) -> Option<RateLimitConfig> {
            None
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }

        fn search_by_title<'a>(&'a self, _title: &'a str) -> ProviderFuture<'a> {
            Box::pin(async move {
                match &self.behavior {
                    Behavior::Records(records) => Ok(records.clone()),
                    Behavior::Fail(make_error) => Err(make_error()),
                    Behavior::NotFound => Err(ProviderError::not_found("no match")),
                    Behavior::Hang => {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok(Vec::new())
                    }
                }
            })
        }

        fn search_by_isbn<'a>(&'a self, isbn: &'a str) -> ProviderFuture<'a> {
            self.search_by_title(isbn)
        }

        fn search_by_creator<'a>(&'a self, creator: &'a str) -> ProviderFuture<'a> {
            self.search_by_title(creator)
        }
    }

    fn record(source: ProviderId, title: &str, confidence: f64) -> MetadataRecord {
        MetadataRecord::new(source, confidence)
            .expect("valid confidence")
            .with_title(title)
            .with_authors(vec![String::from("Jane Author")])
    }

    fn coordinator(providers: Vec<ScriptedProvider>) -> QueryCoordinator {
        let providers: Vec<Arc<dyn MetadataProvider>> = providers
            .into_iter()
            .map(|p| Arc::new(p) as Arc<dyn MetadataProvider>)
            .collect();
        QueryCoordinator::new(
            Arc::new(ProviderRegistry::new(providers)),
            Arc::new(RateLimiterRegistry::new()),
        )
        .with_retry_policy(RetryPolicy::new(
            0,
            crate::retry::Backoff::Fixed {
                delay: Duration::from_millis(1),
            },
        ))
    }

    #[tokio::test]
    async fn single_failing_provider_yields_zero_records_with_diagnostics() {
        let coordinator = coordinator(vec![ScriptedProvider::failing(
            ProviderId::OpenLibrary,
            || ProviderError::upstream("internal server error"),
        )]);

        let outcome = coordinator
            .query(
                &SearchQuery::by_title("Dune").expect("valid"),
                SelectionStrategy::All,
                &SelectionOptions::default(),
            )
            .await
            .expect("query itself never fails on provider errors");

        assert_eq!(outcome.total_records, 0);
        assert_eq!(outcome.providers.len(), 1);
        assert!(!outcome.providers[0].success);
        assert!(outcome.providers[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("internal server error")));
    }

    #[tokio::test]
    async fn mixed_success_keeps_the_successful_records() {
        let coordinator = coordinator(vec![
            ScriptedProvider::failing(ProviderId::OpenLibrary, || {
                ProviderError::unauthorized("bad key")
            }),
            ScriptedProvider::returning(
                ProviderId::GoogleBooks,
                vec![record(ProviderId::GoogleBooks, "Dune", 0.82)],
            ),
        ]);

        let outcome = coordinator
            .query(
                &SearchQuery::by_title("Dune").expect("valid"),
                SelectionStrategy::All,
                &SelectionOptions::default(),
            )
            .await
            .expect("query succeeds");

        assert_eq!(outcome.total_records, 1);
        assert_eq!(outcome.records[0].title.as_deref(), Some("Dune"));
        assert_eq!(outcome.records[0].confidence, 0.82);

        let failed = outcome
            .providers
            .iter()
            .find(|p| p.provider == ProviderId::OpenLibrary)
            .expect("outcome present");
        assert!(!failed.success);
    }

    #[tokio::test]
    async fn duplicate_keys_keep_first_seen_record() {
        let coordinator = coordinator(vec![
            ScriptedProvider::returning(
                ProviderId::OpenLibrary,
                vec![record(ProviderId::OpenLibrary, "The Great Gatsby!", 0.7)],
            ),
            ScriptedProvider::returning(
                ProviderId::GoogleBooks,
                vec![record(ProviderId::GoogleBooks, "the great gatsby", 0.9)],
            ),
        ]);

        let outcome = coordinator
            .query(
                &SearchQuery::by_title("gatsby").expect("valid"),
                SelectionStrategy::All,
                &SelectionOptions::default(),
            )
            .await
            .expect("query succeeds");

        assert_eq!(outcome.total_records, 1);
        // Issuance order decides: Open Library was dispatched first.
        assert_eq!(outcome.records[0].source, ProviderId::OpenLibrary);
    }

    #[tokio::test]
    async fn aggregate_is_sorted_by_descending_confidence() {
        let coordinator = coordinator(vec![
            ScriptedProvider::returning(
                ProviderId::OpenLibrary,
                vec![
                    record(ProviderId::OpenLibrary, "Book One", 0.6),
                    record(ProviderId::OpenLibrary, "Book Two", 0.9),
                ],
            ),
            ScriptedProvider::returning(
                ProviderId::GoogleBooks,
                vec![record(ProviderId::GoogleBooks, "Book Three", 0.75)],
            ),
        ]);

        let outcome = coordinator
            .query(
                &SearchQuery::by_title("book").expect("valid"),
                SelectionStrategy::All,
                &SelectionOptions::default(),
            )
            .await
            .expect("query succeeds");

        let confidences: Vec<f64> = outcome.records.iter().map(|r| r.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.75, 0.6]);
    }

    #[tokio::test]
    async fn not_found_is_a_successful_empty_outcome() {
        let coordinator = coordinator(vec![ScriptedProvider {
            id: ProviderId::Crossref,
            behavior: Behavior::NotFound,
            timeout: Duration::from_secs(3),
        }]);

        let outcome = coordinator
            .query(
                &SearchQuery::by_isbn("9780743273565").expect("valid"),
                SelectionStrategy::All,
                &SelectionOptions::default(),
            )
            .await
            .expect("query succeeds");

        assert_eq!(outcome.total_records, 0);
        assert!(outcome.providers[0].success);
        assert!(outcome.providers[0].error.is_none());
    }

    #[tokio::test]
    async fn exceeding_the_timeout_budget_fails_only_that_provider() {
        let coordinator = coordinator(vec![
            ScriptedProvider {
                id: ProviderId::OpenLibrary,
                behavior: Behavior::Hang,
                timeout: Duration::from_millis(50),
            },
            ScriptedProvider::returning(
                ProviderId::GoogleBooks,
                vec![record(ProviderId::GoogleBooks, "Dune", 0.8)],
            ),
        ]);

        let outcome = coordinator
            .query(
                &SearchQuery::by_title("Dune").expect("valid"),
                SelectionStrategy::All,
                &SelectionOptions::default(),
            )
            .await
            .expect("query succeeds");

        assert_eq!(outcome.total_records, 1);
        let timed_out = outcome
            .providers
            .iter()
            .find(|p| p.provider == ProviderId::OpenLibrary)
            .expect("outcome present");
        assert!(!timed_out.success);
        assert!(timed_out
            .error
            .as_deref()
            .is_some_and(|e| e.contains("budget")));
    }

    #[tokio::test]
    async fn empty_query_is_rejected_loudly() {
        let coordinator = coordinator(vec![]);
        let error = coordinator
            .query(
                &SearchQuery::default(),
                SelectionStrategy::All,
                &SelectionOptions::default(),
            )
            .await
            .expect_err("must fail validation");
        assert!(matches!(error, ValidationError::EmptyCriteria));
    }
}

//! Provider selection: filters plus the four ordering strategies.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::SearchQuery;
use crate::provider::{FieldType, MetadataProvider};
use crate::{ProviderId, ValidationError};

/// Providers added by `consensus` must beat the best already-selected
/// reliability for some relevant field by more than this gap.
pub const CONSENSUS_DIVERSITY_GAP: f64 = 0.1;

/// Provider cap assumed by `consensus` when the caller sets none.
pub const DEFAULT_CONSENSUS_PROVIDERS: usize = 3;

/// Ordering strategy applied after filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Every filtered provider, by descending static priority.
    All,
    /// Alias ordering of `all`; callers typically combine it with
    /// `max_providers`.
    Priority,
    /// Ascending historical average latency; providers without history
    /// fall back to priority order after those with history.
    Fastest,
    /// Reliability-diverse subset covering the query's relevant fields.
    Consensus,
}

impl SelectionStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Priority => "priority",
            Self::Fastest => "fastest",
            Self::Consensus => "consensus",
        }
    }
}

impl FromStr for SelectionStrategy {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "priority" => Ok(Self::Priority),
            "fastest" => Ok(Self::Fastest),
            "consensus" => Ok(Self::Consensus),
            other => Err(ValidationError::UnknownStrategy {
                value: other.to_string(),
            }),
        }
    }
}

/// Filters applied before strategy ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionOptions {
    /// Hard cap on selected providers; `Some(0)` selects nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_providers: Option<usize>,
    /// ISO 639-1 codes; providers covering more of them sort earlier.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferred_languages: Vec<String>,
    /// A provider must support every required field type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_field_types: Vec<FieldType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_providers: Vec<ProviderId>,
    /// Minimum average reliability across the required field types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_reliability: Option<f64>,
}

/// Read interface over recorded provider latencies, consumed by the
/// `fastest` strategy. Supplied by an external performance monitor.
pub trait PerformanceHistory: Send + Sync {
    fn average_duration(&self, provider: ProviderId, operation: &str) -> Option<Duration>;
}

/// History source that knows nothing; `fastest` degrades to priority
/// order.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHistory;

impl PerformanceHistory for NoHistory {
    fn average_duration(&self, _provider: ProviderId, _operation: &str) -> Option<Duration> {
        None
    }
}

/// Choose and order providers for one query.
///
/// Filtering order: exclusions, required field types, minimum average
/// reliability, then a stable reorder by preferred-language overlap.
/// The strategy then orders the survivors (stable, so language order
/// breaks ties) and the result is truncated to `max_providers`.
pub fn select_providers(
    providers: &[Arc<dyn MetadataProvider>],
    query: &SearchQuery,
    strategy: SelectionStrategy,
    options: &SelectionOptions,
    history: &dyn PerformanceHistory,
) -> Vec<Arc<dyn MetadataProvider>> {
    if options.max_providers == Some(0) {
        return Vec::new();
    }

    let mut filtered: Vec<Arc<dyn MetadataProvider>> = providers
        .iter()
        .filter(|provider| !options.exclude_providers.contains(&provider.id()))
        .filter(|provider| {
            options
                .required_field_types
                .iter()
                .all(|field| provider.supports_field(*field))
        })
        .filter(|provider| match options.min_reliability {
            // Nothing to average over without required types.
            Some(min) if !options.required_field_types.is_empty() => {
                provider.average_reliability(&options.required_field_types) >= min
            }
            _ => true,
        })
        .cloned()
        .collect();

    if !options.preferred_languages.is_empty() {
        filtered.sort_by_key(|provider| {
            let overlap = options
                .preferred_languages
                .iter()
                .filter(|language| {
                    provider
                        .languages()
                        .iter()
                        .any(|supported| supported.eq_ignore_ascii_case(language))
                })
                .count();
            std::cmp::Reverse(overlap)
        });
    }

    let mut ordered = match strategy {
        SelectionStrategy::All | SelectionStrategy::Priority => {
            filtered.sort_by_key(|provider| std::cmp::Reverse(provider.priority()));
            filtered
        }
        SelectionStrategy::Fastest => order_fastest(filtered, history),
        SelectionStrategy::Consensus => {
            let limit = options
                .max_providers
                .unwrap_or(DEFAULT_CONSENSUS_PROVIDERS);
            return consensus_subset(filtered, query, limit);
        }
    };

    if let Some(limit) = options.max_providers {
        ordered.truncate(limit);
    }
    ordered
}

fn order_fastest(
    filtered: Vec<Arc<dyn MetadataProvider>>,
    history: &dyn PerformanceHistory,
) -> Vec<Arc<dyn MetadataProvider>> {
    let mut timed: Vec<(Arc<dyn MetadataProvider>, Duration)> = Vec::new();
    let mut untimed: Vec<Arc<dyn MetadataProvider>> = Vec::new();

    for provider in filtered {
        match history.average_duration(provider.id(), "search") {
            Some(duration) => timed.push((provider, duration)),
            None => untimed.push(provider),
        }
    }

    timed.sort_by_key(|(_, duration)| *duration);
    untimed.sort_by_key(|provider| std::cmp::Reverse(provider.priority()));

    timed
        .into_iter()
        .map(|(provider, _)| provider)
        .chain(untimed)
        .collect()
}

/// Greedy reliability-diverse subset: always take the best average scorer
/// over the query's relevant fields, then add providers that beat the
/// best selected per-field reliability by more than the diversity gap.
/// May select fewer than the limit — quality over quantity.
fn consensus_subset(
    filtered: Vec<Arc<dyn MetadataProvider>>,
    query: &SearchQuery,
    limit: usize,
) -> Vec<Arc<dyn MetadataProvider>> {
    let relevant = query.relevant_field_types();

    let mut scored: Vec<(Arc<dyn MetadataProvider>, f64)> = filtered
        .into_iter()
        .map(|provider| {
            let score = provider.average_reliability(&relevant);
            (provider, score)
        })
        .collect();
    scored.sort_by(|left, right| right.1.total_cmp(&left.1));

    let mut selected: Vec<Arc<dyn MetadataProvider>> = Vec::new();
    let mut best_per_field: HashMap<FieldType, f64> = HashMap::new();

    for (provider, _) in scored {
        if selected.len() >= limit {
            break;
        }

        let complements = relevant.iter().any(|field| {
            let best = best_per_field.get(field).copied().unwrap_or(0.0);
            provider.reliability(*field) > best + CONSENSUS_DIVERSITY_GAP
        });

        if selected.is_empty() || complements {
            for field in &relevant {
                let entry = best_per_field.entry(*field).or_insert(0.0);
                *entry = entry.max(provider.reliability(*field));
            }
            selected.push(provider);
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderFuture;
    use crate::rate_limit::RateLimitConfig;

    struct FakeProvider {
        id: ProviderId,
        priority: u8,
        languages: &'static [&'static str],
        reliability: Vec<(FieldType, f64)>,
    }

    impl FakeProvider {
        fn new(id: ProviderId, priority: u8) -> Self {
            Self {
                id,
                priority,
                languages: &["en"],
                reliability: FieldType::all().iter().map(|f| (*f, 0.7)).collect(),
            }
        }

        fn with_reliability(mut self, field: FieldType, value: f64) -> Self {
            self.reliability.retain(|(f, _)| *f != field);
            self.reliability.push((field, value));
            self
        }

        fn with_languages(mut self, languages: &'static [&'static str]) -> Self {
            self.languages = languages;
            self
        }
    }

    impl MetadataProvider for FakeProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        fn supports_field(&self, field: FieldType) -> bool {
            self.reliability(field) > 0.0
        }

        fn reliability(&self, field: FieldType) -> f64 {
            self.reliability
                .iter()
                .find(|(f, _)| *f == field)
                .map(|(_, value)| *value)
                .unwrap_or(0.0)
        }

        fn priority(&self) -> u8 {
            self.priority
        }

        fn languages(&self) -> &[&'static str] {
            self.languages
        }

        fn rate_limit(&self) -> Option<RateLimitConfig> {
            None
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(3)
        }

        fn search_by_title<'a>(&'a self, _title: &'a str) -> ProviderFuture<'a> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn search_by_isbn<'a>(&'a self, _isbn: &'a str) -> ProviderFuture<'a> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn search_by_creator<'a>(&'a self, _creator: &'a str) -> ProviderFuture<'a> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    struct FixedHistory(Vec<(ProviderId, Duration)>);

    impl PerformanceHistory for FixedHistory {
        fn average_duration(&self, provider: ProviderId, _operation: &str) -> Option<Duration> {
            self.0
                .iter()
                .find(|(id, _)| *id == provider)
                .map(|(_, duration)| *duration)
        }
    }

    fn providers(list: Vec<FakeProvider>) -> Vec<Arc<dyn MetadataProvider>> {
        list.into_iter()
            .map(|p| Arc::new(p) as Arc<dyn MetadataProvider>)
            .collect()
    }

    fn ids(selected: &[Arc<dyn MetadataProvider>]) -> Vec<ProviderId> {
        selected.iter().map(|p| p.id()).collect()
    }

    #[test]
    fn priority_orders_descending() {
        let set = providers(vec![
            FakeProvider::new(ProviderId::OpenLibrary, 50),
            FakeProvider::new(ProviderId::GoogleBooks, 90),
            FakeProvider::new(ProviderId::Crossref, 70),
        ]);

        let selected = select_providers(
            &set,
            &SearchQuery::by_title("Dune").expect("valid"),
            SelectionStrategy::Priority,
            &SelectionOptions::default(),
            &NoHistory,
        );

        assert_eq!(
            ids(&selected),
            vec![ProviderId::GoogleBooks, ProviderId::Crossref, ProviderId::OpenLibrary]
        );
    }

    #[test]
    fn zero_max_providers_selects_nothing() {
        let set = providers(vec![FakeProvider::new(ProviderId::OpenLibrary, 50)]);
        let options = SelectionOptions {
            max_providers: Some(0),
            ..SelectionOptions::default()
        };

        let selected = select_providers(
            &set,
            &SearchQuery::default(),
            SelectionStrategy::All,
            &options,
            &NoHistory,
        );
        assert!(selected.is_empty());
    }

    #[test]
    fn exclusions_and_required_types_filter() {
        let set = providers(vec![
            FakeProvider::new(ProviderId::OpenLibrary, 50),
            FakeProvider::new(ProviderId::GoogleBooks, 90)
                .with_reliability(FieldType::CoverImage, 0.0),
            FakeProvider::new(ProviderId::Crossref, 70),
        ]);
        let options = SelectionOptions {
            exclude_providers: vec![ProviderId::Crossref],
            required_field_types: vec![FieldType::CoverImage],
            ..SelectionOptions::default()
        };

        let selected = select_providers(
            &set,
            &SearchQuery::default(),
            SelectionStrategy::All,
            &options,
            &NoHistory,
        );
        assert_eq!(ids(&selected), vec![ProviderId::OpenLibrary]);
    }

    #[test]
    fn min_reliability_filters_on_required_type_average() {
        let set = providers(vec![
            FakeProvider::new(ProviderId::OpenLibrary, 50)
                .with_reliability(FieldType::Isbn, 0.95),
            FakeProvider::new(ProviderId::GoogleBooks, 90)
                .with_reliability(FieldType::Isbn, 0.5),
        ]);
        let options = SelectionOptions {
            required_field_types: vec![FieldType::Isbn],
            min_reliability: Some(0.8),
            ..SelectionOptions::default()
        };

        let selected = select_providers(
            &set,
            &SearchQuery::default(),
            SelectionStrategy::All,
            &options,
            &NoHistory,
        );
        assert_eq!(ids(&selected), vec![ProviderId::OpenLibrary]);
    }

    #[test]
    fn language_overlap_reorders_without_filtering() {
        let set = providers(vec![
            FakeProvider::new(ProviderId::OpenLibrary, 50).with_languages(&["en"]),
            FakeProvider::new(ProviderId::GoogleBooks, 50).with_languages(&["de", "fr"]),
        ]);
        let options = SelectionOptions {
            preferred_languages: vec!["de".to_string()],
            ..SelectionOptions::default()
        };

        let selected = select_providers(
            &set,
            &SearchQuery::default(),
            SelectionStrategy::All,
            &options,
            &NoHistory,
        );
        // Equal priority: language order survives the stable sort, and the
        // non-matching provider is still present.
        assert_eq!(
            ids(&selected),
            vec![ProviderId::GoogleBooks, ProviderId::OpenLibrary]
        );
    }

    #[test]
    fn fastest_uses_history_then_priority_fallback() {
        let set = providers(vec![
            FakeProvider::new(ProviderId::OpenLibrary, 90),
            FakeProvider::new(ProviderId::GoogleBooks, 50),
            FakeProvider::new(ProviderId::Crossref, 70),
        ]);
        let history = FixedHistory(vec![
            (ProviderId::GoogleBooks, Duration::from_millis(120)),
            (ProviderId::Crossref, Duration::from_millis(80)),
        ]);

        let selected = select_providers(
            &set,
            &SearchQuery::default(),
            SelectionStrategy::Fastest,
            &SelectionOptions::default(),
            &history,
        );
        assert_eq!(
            ids(&selected),
            vec![ProviderId::Crossref, ProviderId::GoogleBooks, ProviderId::OpenLibrary]
        );
    }

    #[test]
    fn consensus_includes_top_scorer_and_complementary_coverage() {
        let query = SearchQuery::by_title("Dune").expect("valid");
        // OpenLibrary is best on title, GoogleBooks much better on nothing
        // relevant, Crossref clearly better on title than nothing but not
        // beyond the gap.
        let set = providers(vec![
            FakeProvider::new(ProviderId::OpenLibrary, 50)
                .with_reliability(FieldType::Title, 0.9),
            FakeProvider::new(ProviderId::GoogleBooks, 50)
                .with_reliability(FieldType::Title, 0.85),
            FakeProvider::new(ProviderId::Crossref, 50)
                .with_reliability(FieldType::Title, 0.6),
        ]);

        let selected = select_providers(
            &set,
            &query,
            SelectionStrategy::Consensus,
            &SelectionOptions::default(),
            &NoHistory,
        );

        // Top scorer always included; the others never beat 0.9 by more
        // than the diversity gap, so consensus stops below the limit.
        assert_eq!(ids(&selected), vec![ProviderId::OpenLibrary]);
    }

    #[test]
    fn consensus_adds_provider_that_beats_gap_on_any_relevant_field() {
        let query = SearchQuery::by_title("Dune")
            .expect("valid")
            .with_creator("Frank Herbert");
        let set = providers(vec![
            FakeProvider::new(ProviderId::OpenLibrary, 50)
                .with_reliability(FieldType::Title, 0.95)
                .with_reliability(FieldType::Authors, 0.6),
            FakeProvider::new(ProviderId::GoogleBooks, 50)
                .with_reliability(FieldType::Title, 0.5)
                .with_reliability(FieldType::Authors, 0.95),
        ]);

        let selected = select_providers(
            &set,
            &query,
            SelectionStrategy::Consensus,
            &SelectionOptions::default(),
            &NoHistory,
        );

        assert_eq!(
            ids(&selected),
            vec![ProviderId::OpenLibrary, ProviderId::GoogleBooks]
        );
    }
}

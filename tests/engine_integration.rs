//! End-to-end flow over the mock registry: discover, reconcile, screen.

use colophon_tests::*;

#[tokio::test]
async fn discovery_reconciliation_and_screening_compose() {
    // Discover against the deterministic mock providers.
    let coordinator = QueryCoordinator::new(
        Arc::new(RegistryBuilder::new().with_mock_mode().build()),
        Arc::new(RateLimiterRegistry::new()),
    );
    let outcome = coordinator
        .query(
            &SearchQuery::by_title("The Great Gatsby").expect("valid"),
            SelectionStrategy::All,
            &SelectionOptions::default(),
        )
        .await
        .expect("query succeeds");
    assert!(outcome.total_records > 0);

    // Reconcile the aggregate into one preview.
    let inputs = FieldInputs::from_records(&outcome.records);
    let preview = ReconcileEngine::default().reconcile(&inputs);
    let title = preview.title.expect("title reconciled");
    assert!(title.value.to_lowercase().contains("gatsby"));
    assert!((0.0..=1.0).contains(&title.confidence));

    // Screen the reconciled candidate against a small catalog.
    let candidate = CatalogEntry {
        title: title.value.clone(),
        authors: preview
            .authors
            .map(|field| field.value)
            .unwrap_or_default(),
        isbn: preview
            .identifiers
            .map(|field| {
                field
                    .value
                    .into_iter()
                    .filter(|id| id.kind == colophon_core::IdentifierKind::Isbn)
                    .map(|id| id.normalized)
                    .collect()
            })
            .unwrap_or_default(),
        publication_date: preview.publication_date.map(|field| field.value),
        publisher: preview.publisher.map(|field| field.value),
        series: None,
    };
    let catalog = vec![CatalogEntry {
        title: String::from("The Great Gatsby"),
        authors: vec![String::from("F. Scott Fitzgerald")],
        isbn: vec![String::from("978-0-7432-7356-5")],
        publication_date: None,
        publisher: None,
        series: None,
    }];

    let matches = DuplicateDetector::default().detect(&candidate, &catalog);
    assert!(!matches.is_empty());
    assert_eq!(matches[0].kind, MatchKind::Exact);
    assert_eq!(matches[0].recommendation, Recommendation::Skip);
}

#[tokio::test]
async fn disabling_every_provider_yields_an_empty_outcome_not_an_error() {
    // With every provider disabled the query still completes: zero
    // records, zero outcomes, no error surfaced to the caller.
    let mut registry = RegistryBuilder::new().with_mock_mode().build();
    registry.set_enabled(ProviderId::OpenLibrary, false);
    registry.set_enabled(ProviderId::GoogleBooks, false);
    registry.set_enabled(ProviderId::Crossref, false);

    let coordinator = QueryCoordinator::new(
        Arc::new(registry),
        Arc::new(RateLimiterRegistry::new()),
    );
    let outcome = coordinator
        .query(
            &SearchQuery::by_title("Dune").expect("valid"),
            SelectionStrategy::All,
            &SelectionOptions::default(),
        )
        .await
        .expect("query never fails on provider availability");

    assert_eq!(outcome.total_records, 0);
    assert!(outcome.records.is_empty());
}

//! Contract tests every provider adapter must satisfy.
//!
//! These tests pin the capability surface the engine relies on: stable
//! identifiers, bounded reliability scores, sane budgets, and offline
//! mock behavior.

use colophon_core::{
    adapters::{CrossrefAdapter, GoogleBooksAdapter, OpenLibraryAdapter},
    provider::{FieldType, MetadataProvider},
    ProviderId,
};
use std::sync::Arc;
use std::time::Duration;

fn all_adapters() -> Vec<Arc<dyn MetadataProvider>> {
    vec![
        Arc::new(OpenLibraryAdapter::default()),
        Arc::new(GoogleBooksAdapter::default()),
        Arc::new(CrossrefAdapter::default()),
    ]
}

#[test]
fn adapter_ids_are_unique() {
    let mut ids: Vec<ProviderId> = all_adapters().iter().map(|a| a.id()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[test]
fn reliability_scores_are_within_the_unit_interval() {
    for adapter in all_adapters() {
        for field in FieldType::all() {
            let score = adapter.reliability(field);
            assert!(
                (0.0..=1.0).contains(&score),
                "{} reliability for {field} out of range: {score}",
                adapter.id()
            );
        }
    }
}

#[test]
fn supported_fields_match_positive_reliability() {
    for adapter in all_adapters() {
        for field in FieldType::all() {
            assert_eq!(
                adapter.supports_field(field),
                adapter.reliability(field) > 0.0,
                "{} capability/reliability mismatch on {field}",
                adapter.id()
            );
        }
    }
}

#[test]
fn every_adapter_declares_a_timeout_budget() {
    for adapter in all_adapters() {
        assert!(adapter.timeout() > Duration::ZERO);
    }
}

#[test]
fn declared_rate_limits_admit_at_least_one_request() {
    for adapter in all_adapters() {
        if let Some(config) = adapter.rate_limit() {
            assert!(config.max_requests > 0, "{}", adapter.id());
            assert!(config.window > Duration::ZERO, "{}", adapter.id());
        }
    }
}

#[tokio::test]
async fn mock_title_search_yields_well_formed_records() {
    for adapter in all_adapters() {
        let records = adapter
            .search_by_title("The Great Gatsby")
            .await
            .unwrap_or_else(|e| panic!("{} mock search failed: {e}", adapter.id()));

        assert!(!records.is_empty(), "{}", adapter.id());
        for record in &records {
            assert_eq!(record.source, adapter.id());
            assert!(
                (0.0..=1.0).contains(&record.confidence),
                "{} record confidence out of range",
                adapter.id()
            );
            assert!(record.title.is_some());
        }
    }
}

#[tokio::test]
async fn mock_isbn_search_echoes_the_requested_isbn() {
    for adapter in all_adapters() {
        let records = adapter
            .search_by_isbn("9780261103573")
            .await
            .unwrap_or_else(|e| panic!("{} mock isbn search failed: {e}", adapter.id()));
        assert!(records
            .iter()
            .any(|record| record.isbn.iter().any(|isbn| isbn == "9780261103573")));
    }
}

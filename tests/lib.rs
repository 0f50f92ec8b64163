// Test library for engine behavior tests
pub use colophon_core::{
    adapters::{CrossrefAdapter, GoogleBooksAdapter, OpenLibraryAdapter},
    coordinator::{QueryCoordinator, QueryOutcome},
    dedupe::{CatalogEntry, DuplicateConfig, DuplicateDetector, MatchKind, Recommendation},
    provider::{FieldType, MetadataProvider, ProviderError},
    rate_limit::RateLimiterRegistry,
    reconcile::{FieldInputs, ReconcileEngine, Sourced},
    registry::{ProviderRegistry, RegistryBuilder},
    selection::{SelectionOptions, SelectionStrategy},
    MetadataRecord, MetadataSource, ProviderId, PublicationDate, SearchQuery,
};
pub use std::sync::Arc;

//! # Colophon Core
//!
//! Metadata discovery and reconciliation engine for bibliographic records.
//!
//! ## Overview
//!
//! This crate provides the engine behind catalog enrichment:
//!
//! - **Canonical domain models** for records, queries, dates, subjects,
//!   and identifiers
//! - **Provider trait and adapters** over external metadata sources
//! - **Rate limiting and retry** gating every outbound provider call
//! - **Selection strategies** choosing which providers answer a query
//! - **Concurrent query coordination** with per-provider diagnostics
//! - **Field reconciliation** merging disagreeing answers into one value
//!   with confidence, reasoning, and a typed conflict record
//! - **Duplicate detection** against an existing catalog
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters (Open Library, Google Books, Crossref) |
//! | [`coordinator`] | Concurrent query fan-out and aggregation |
//! | [`dedupe`] | Duplicate screening against catalog entries |
//! | [`domain`] | Domain models and value-type normalization |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`provider`] | Provider trait and error taxonomy |
//! | [`rate_limit`] | Sliding-window admission control |
//! | [`reconcile`] | Field reconcilers and conflict detection |
//! | [`registry`] | Provider registry and builder |
//! | [`retry`] | Bounded retry with exponential backoff |
//! | [`selection`] | Provider selection strategies |
//! | [`similarity`] | String/set similarity utilities |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use colophon_core::{
//!     QueryCoordinator, RateLimiterRegistry, RegistryBuilder, SearchQuery,
//!     SelectionOptions, SelectionStrategy,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(RegistryBuilder::new().with_mock_mode().build());
//!     let limiters = Arc::new(RateLimiterRegistry::new());
//!     let coordinator = QueryCoordinator::new(registry, limiters);
//!
//!     let query = SearchQuery::by_title("The Great Gatsby")?;
//!     let outcome = coordinator
//!         .query(&query, SelectionStrategy::Consensus, &SelectionOptions::default())
//!         .await?;
//!
//!     println!("{} records from {} providers", outcome.total_records, outcome.providers.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Provider failures never escape [`QueryCoordinator::query`] — they are
//! isolated into the per-provider diagnostics. Only malformed input
//! (an empty query, out-of-range confidence) fails loudly, as
//! [`ValidationError`]. Reconciliation and duplicate detection are total:
//! the worst case is low confidence and many conflicts, not an error.

pub mod adapters;
pub mod coordinator;
pub mod dedupe;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod provider;
pub mod rate_limit;
pub mod reconcile;
pub mod registry;
pub mod retry;
pub mod selection;
pub mod similarity;
pub mod source;

// Re-export commonly used types at crate root for convenience

// Adapter implementations
pub use adapters::{CrossrefAdapter, GoogleBooksAdapter, OpenLibraryAdapter};

// Coordination
pub use coordinator::{ProviderOutcome, QueryCoordinator, QueryOutcome};

// Duplicate detection
pub use dedupe::{
    CatalogEntry, DuplicateConfig, DuplicateDetector, DuplicateMatch, FieldWeights, MatchKind,
    Recommendation,
};

// Domain models
pub use domain::{
    DatePrecision, Identifier, IdentifierKind, MetadataRecord, MetadataSource, PhysicalDimensions,
    PublicationDate, SearchQuery, Subject, SubjectClaim, SubjectKind,
};

// Error types
pub use error::ValidationError;

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, NoopHttpClient, ReqwestHttpClient,
};

// Provider contract
pub use provider::{FieldType, MetadataProvider, ProviderError, ProviderErrorKind};

// Rate limiting
pub use rate_limit::{RateLimitConfig, RateLimiterRegistry};

// Reconciliation
pub use reconcile::{
    Conflict, ConflictConfig, ConflictDetector, ConflictKind, ConflictSeverity, ConflictSummary,
    FieldInputs, ReconcileEngine, ReconciledField, ReconciledPreview, Sourced,
};

// Registry
pub use registry::{ProviderRegistry, ProviderSnapshot, RegistryBuilder};

// Retry logic
pub use retry::{Backoff, RetryPolicy, RetryState};

// Selection strategies
pub use selection::{
    NoHistory, PerformanceHistory, SelectionOptions, SelectionStrategy,
};

// Source identifiers
pub use source::ProviderId;

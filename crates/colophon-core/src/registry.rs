//! Provider registry: configured adapters with enable/disable switches.

use std::env;
use std::sync::Arc;

use serde::Serialize;

use crate::adapters::{CrossrefAdapter, GoogleBooksAdapter, OpenLibraryAdapter};
use crate::http_client::ReqwestHttpClient;
use crate::provider::{FieldType, MetadataProvider};
use crate::rate_limit::{RateLimitConfig, RateLimiterRegistry};
use crate::ProviderId;

struct RegistryEntry {
    provider: Arc<dyn MetadataProvider>,
    enabled: bool,
}

/// Static capability snapshot of one registered provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSnapshot {
    pub id: ProviderId,
    pub enabled: bool,
    pub priority: u8,
    pub supported_fields: Vec<FieldType>,
    pub languages: Vec<String>,
    pub rate_limit: Option<RateLimitConfig>,
    pub timeout_ms: u64,
}

/// Holds configured providers in registration order.
pub struct ProviderRegistry {
    entries: Vec<RegistryEntry>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn MetadataProvider>>) -> Self {
        Self {
            entries: providers
                .into_iter()
                .map(|provider| RegistryEntry {
                    provider,
                    enabled: true,
                })
                .collect(),
        }
    }

    /// Enable or disable one provider; returns false when unknown.
    pub fn set_enabled(&mut self, id: ProviderId, enabled: bool) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.provider.id() == id)
        {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: ProviderId) -> Option<Arc<dyn MetadataProvider>> {
        self.entries
            .iter()
            .find(|entry| entry.provider.id() == id)
            .map(|entry| Arc::clone(&entry.provider))
    }

    /// Enabled providers in registration order.
    pub fn enabled_providers(&self) -> Vec<Arc<dyn MetadataProvider>> {
        self.entries
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| Arc::clone(&entry.provider))
            .collect()
    }

    pub fn snapshot(&self, id: ProviderId) -> Option<ProviderSnapshot> {
        self.entries
            .iter()
            .find(|entry| entry.provider.id() == id)
            .map(|entry| snapshot_entry(entry))
    }

    pub fn snapshots(&self) -> Vec<ProviderSnapshot> {
        self.entries.iter().map(snapshot_entry).collect()
    }

    /// Seed the rate-limiter registry with every enabled provider's
    /// declared limits.
    pub fn register_rate_limits(&self, limiters: &RateLimiterRegistry) {
        for entry in &self.entries {
            if !entry.enabled {
                continue;
            }
            if let Some(config) = entry.provider.rate_limit() {
                limiters.register(entry.provider.id().as_str(), config);
            }
        }
    }
}

fn snapshot_entry(entry: &RegistryEntry) -> ProviderSnapshot {
    let provider = &entry.provider;
    ProviderSnapshot {
        id: provider.id(),
        enabled: entry.enabled,
        priority: provider.priority(),
        supported_fields: FieldType::all()
            .into_iter()
            .filter(|field| provider.supports_field(*field))
            .collect(),
        languages: provider.languages().iter().map(|s| s.to_string()).collect(),
        rate_limit: provider.rate_limit(),
        timeout_ms: provider.timeout().as_millis() as u64,
    }
}

/// Builder wiring adapters with either deterministic mocks or real HTTP
/// clients and environment-supplied API keys.
///
/// # Environment Variables
///
/// | Provider | Primary | Fallback |
/// |----------|---------|----------|
/// | Google Books | `COLOPHON_GOOGLE_BOOKS_API_KEY` | `GOOGLE_BOOKS_API_KEY` |
/// | Open Library | (no key required) | - |
/// | Crossref | (no key required) | - |
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    use_mock: bool,
    google_books_api_key: Option<String>,
    disable_open_library: bool,
    disable_google_books: bool,
    disable_crossref: bool,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// All adapters use the no-op transport with deterministic data.
    pub fn with_mock_mode(mut self) -> Self {
        self.use_mock = true;
        self
    }

    /// Use real HTTP clients, reading API keys from the environment.
    pub fn with_real_clients(mut self) -> Self {
        self.use_mock = false;
        self.google_books_api_key = env::var("COLOPHON_GOOGLE_BOOKS_API_KEY")
            .or_else(|_| env::var("GOOGLE_BOOKS_API_KEY"))
            .ok();
        self
    }

    pub fn with_google_books_key(mut self, key: impl Into<String>) -> Self {
        self.google_books_api_key = Some(key.into());
        self
    }

    pub fn with_open_library_enabled(mut self, enabled: bool) -> Self {
        self.disable_open_library = !enabled;
        self
    }

    pub fn with_google_books_enabled(mut self, enabled: bool) -> Self {
        self.disable_google_books = !enabled;
        self
    }

    pub fn with_crossref_enabled(mut self, enabled: bool) -> Self {
        self.disable_crossref = !enabled;
        self
    }

    pub fn build(self) -> ProviderRegistry {
        let mut providers: Vec<Arc<dyn MetadataProvider>> = Vec::new();
        let http = if self.use_mock {
            None
        } else {
            Some(Arc::new(ReqwestHttpClient::new()))
        };

        if !self.disable_open_library {
            providers.push(match &http {
                Some(http) => Arc::new(OpenLibraryAdapter::with_http_client(http.clone())),
                None => Arc::new(OpenLibraryAdapter::default()),
            });
        }

        if !self.disable_google_books {
            providers.push(match &http {
                Some(http) => Arc::new(GoogleBooksAdapter::with_http_client(
                    http.clone(),
                    self.google_books_api_key.clone(),
                )),
                None => Arc::new(GoogleBooksAdapter::default()),
            });
        }

        if !self.disable_crossref {
            providers.push(match &http {
                Some(http) => Arc::new(CrossrefAdapter::with_http_client(http.clone())),
                None => Arc::new(CrossrefAdapter::default()),
            });
        }

        ProviderRegistry::new(providers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_registry_registers_all_known_providers() {
        let registry = RegistryBuilder::new().with_mock_mode().build();
        let ids: Vec<ProviderId> = registry
            .enabled_providers()
            .iter()
            .map(|p| p.id())
            .collect();
        assert_eq!(
            ids,
            vec![
                ProviderId::OpenLibrary,
                ProviderId::GoogleBooks,
                ProviderId::Crossref
            ]
        );
    }

    #[test]
    fn disabling_a_provider_removes_it_from_selection_input() {
        let mut registry = RegistryBuilder::new().with_mock_mode().build();
        assert!(registry.set_enabled(ProviderId::Crossref, false));

        let ids: Vec<ProviderId> = registry
            .enabled_providers()
            .iter()
            .map(|p| p.id())
            .collect();
        assert!(!ids.contains(&ProviderId::Crossref));

        let snapshot = registry
            .snapshot(ProviderId::Crossref)
            .expect("still registered");
        assert!(!snapshot.enabled);
    }

    #[test]
    fn rate_limits_are_seeded_for_enabled_providers_only() {
        let mut registry = RegistryBuilder::new().with_mock_mode().build();
        registry.set_enabled(ProviderId::GoogleBooks, false);

        let limiters = RateLimiterRegistry::new();
        registry.register_rate_limits(&limiters);

        assert!(limiters.remaining(ProviderId::OpenLibrary.as_str()).is_some());
        assert!(limiters.remaining(ProviderId::GoogleBooks.as_str()).is_none());
    }
}

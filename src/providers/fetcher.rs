//! Fetcher capability and its registry
//!
//! A [`Fetcher`] retrieves the raw link entries for one provider. The
//! registry resolves the implementation for a provider first by its id, then
//! by its type tag, so one generic fetcher (e.g. the sitemap fetcher) can
//! serve many providers while a specific provider can still override it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::crawler::client::HttpPageClient;
use crate::error::FetchError;
use crate::models::Article;
use crate::providers::sitemap::{GoogleNewsFetcher, PROVIDER_TYPE_GOOGLE_NEWS};
use crate::providers::Provider;

/// Retrieves and extracts articles for one provider
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Identifier of this fetcher (a provider id or a provider type tag)
    fn id(&self) -> &str;

    /// Fetch the provider's feed and extract its articles
    async fn fetch(&self, provider: &Provider) -> Result<Vec<Article>, FetchError>;
}

impl std::fmt::Debug for dyn Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher").field("id", &self.id()).finish()
    }
}

/// Resolves the fetcher implementation for a given provider
#[derive(Default)]
pub struct FetcherRegistry {
    by_id: HashMap<String, Arc<dyn Fetcher>>,
    by_type: HashMap<String, Arc<dyn Fetcher>>,
}

impl FetcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry wired with the built-in provider-type fetchers
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the shared HTTP client cannot be built
    pub fn with_defaults(timeout: Duration) -> Result<Self, FetchError> {
        let client = Arc::new(HttpPageClient::new(timeout)?);
        let mut registry = Self::new();
        registry.register_for_type(
            PROVIDER_TYPE_GOOGLE_NEWS,
            Arc::new(GoogleNewsFetcher::new(client)),
        );
        Ok(registry)
    }

    /// Register a fetcher serving exactly one provider id
    pub fn register(&mut self, fetcher: Arc<dyn Fetcher>) {
        let key = fetcher.id().trim().to_ascii_lowercase();
        if key.is_empty() {
            return;
        }
        self.by_id.insert(key, fetcher);
    }

    /// Register a fetcher serving every provider of the given type
    pub fn register_for_type(&mut self, kind: &str, fetcher: Arc<dyn Fetcher>) {
        let key = kind.trim().to_ascii_lowercase();
        if key.is_empty() {
            return;
        }
        self.by_type.insert(key, fetcher);
    }

    /// Select the fetcher for the provider by id, falling back to its type
    pub fn fetcher_for(&self, provider: &Provider) -> Result<Arc<dyn Fetcher>, FetchError> {
        let id_key = provider.id.trim().to_ascii_lowercase();
        if let Some(fetcher) = self.by_id.get(&id_key) {
            return Ok(Arc::clone(fetcher));
        }

        let type_key = provider.kind.trim().to_ascii_lowercase();
        if !type_key.is_empty() {
            if let Some(fetcher) = self.by_type.get(&type_key) {
                return Ok(Arc::clone(fetcher));
            }
        }

        Err(FetchError::NoFetcher {
            provider_id: provider.id.clone(),
            kind: provider.kind.clone(),
        })
    }
}

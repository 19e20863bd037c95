//! Public resolution API
//!
//! Validates requests, consults the cache and delegates to the
//! [`FallbackOrchestrator`].

use std::sync::Arc;

use crate::cache::{CacheKey, ResolutionCache};
use crate::catalog::CatalogClient;
use crate::client::HttpClient;
use crate::config::ResolverConfig;
use crate::error::{ResolveError, Result};
use crate::orchestrator::FallbackOrchestrator;
use crate::providers::{ApiBackedProvider, HtmlScrapedProvider, ProviderClient};
use crate::resolver::PlayerResolver;
use crate::types::{ProviderDescriptor, ProviderKind, ResolutionResult, ResolveRequest};

/// Resolution façade shared by every request handler
///
/// Holds the static provider registry and the optional result cache.
/// Concurrent calls share nothing else.
#[derive(Debug)]
pub struct ResolutionService {
    orchestrator: FallbackOrchestrator,
    cache: ResolutionCache,
    catalog: Option<CatalogClient>,
}

impl ResolutionService {
    /// Create a service around an orchestrator and a cache
    pub fn new(orchestrator: FallbackOrchestrator, cache: ResolutionCache) -> Self {
        Self {
            orchestrator,
            cache,
            catalog: None,
        }
    }

    pub fn with_catalog(mut self, catalog: CatalogClient) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Build the full service from static configuration
    ///
    /// Every provider gets its own [`HttpClient`] so rate limits apply per
    /// upstream site. Disabled providers are left out of the registry.
    ///
    /// # Errors
    /// - `InvalidRequest` if the configuration does not validate
    /// - `Internal` if an HTTP client cannot be created
    ///
    /// # Example
    /// ```no_run
    /// # fn example() -> anistream_core::Result<()> {
    /// use anistream_core::{ResolutionService, ResolverConfig};
    /// let service = ResolutionService::from_config(&ResolverConfig::default())?;
    /// assert_eq!(service.providers()[0].id, "pahe");
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ResolveError::invalid(e.to_string()))?;

        let http = || {
            HttpClient::with_config(&config.client).map_err(|e| ResolveError::Internal(e.to_string()))
        };

        let mut providers: Vec<Arc<dyn ProviderClient>> = Vec::new();
        for provider in config.enabled_providers() {
            let descriptor = provider.descriptor();
            let client: Arc<dyn ProviderClient> = match provider.kind {
                ProviderKind::ApiBacked => Arc::new(
                    ApiBackedProvider::new(descriptor, &provider.base_url, http()?)
                        .with_match_threshold(config.match_threshold),
                ),
                ProviderKind::HtmlScraped => {
                    Arc::new(HtmlScrapedProvider::new(descriptor, &provider.base_url, http()?))
                }
            };
            providers.push(client);
        }

        // Spacing on the shared embed client is tracked per embed origin.
        let resolver = PlayerResolver::new(http()?).with_timeout(config.resolver_timeout());
        let orchestrator = FallbackOrchestrator::new(providers, resolver)
            .with_match_threshold(config.match_threshold)
            .with_provider_budget(config.provider_budget());
        let cache = ResolutionCache::new(config.cache_ttl(), config.cache_capacity);

        let mut service = Self::new(orchestrator, cache);
        if let Some(base) = &config.catalog_base_url {
            service = service.with_catalog(CatalogClient::new(base, http()?));
        }

        tracing::info!(
            providers = ?service.providers().iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            cache = service.cache.is_enabled(),
            "resolution service ready"
        );
        Ok(service)
    }

    /// Registry entries in the order they are tried
    pub fn providers(&self) -> Vec<ProviderDescriptor> {
        self.orchestrator.descriptors()
    }

    pub fn catalog(&self) -> Option<&CatalogClient> {
        self.catalog.as_ref()
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// Resolve one episode to ranked stream sources
    ///
    /// A fresh cached result is returned without touching any provider
    /// unless `force_refresh` is set. Only successes are cached.
    ///
    /// # Errors
    /// - `InvalidRequest` for an empty title, a negative or non-finite
    ///   episode, or an unknown preferred provider
    /// - `AllProvidersExhausted` when no selected provider produced sources
    /// - `ProviderUnavailable` when the single preferred provider was unreachable
    pub async fn resolve(&self, request: &ResolveRequest) -> Result<ResolutionResult> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(ResolveError::invalid("title must not be empty"));
        }
        if !request.episode.is_finite() || request.episode < 0.0 {
            return Err(ResolveError::invalid(format!(
                "episode must be a finite non-negative number, got {}",
                request.episode
            )));
        }
        let preferred = request
            .preferred_provider
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        if let Some(id) = preferred
            && !self.orchestrator.has_provider(id)
        {
            return Err(ResolveError::invalid(format!("unknown provider `{}`", id)));
        }

        let key = CacheKey::new(title, request.episode, preferred);
        if !request.force_refresh {
            if let Some(hit) = self.cache.get(&key).await {
                tracing::debug!(title, episode = request.episode, provider = %hit.provider_used, "cache hit");
                return Ok(hit);
            }
            tracing::debug!(title, episode = request.episode, "cache miss");
        }

        let result = self.orchestrator.resolve(title, request.episode, preferred).await?;
        self.cache.insert(key, result.clone()).await;
        Ok(result)
    }
}

//! Static resolver configuration
//!
//! Loaded once at startup, usually from a JSON file. Every field has a
//! default so a partial document only overrides what it names.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};
use crate::client::ClientConfig;
use crate::matching::DEFAULT_MATCH_THRESHOLD;
use crate::orchestrator::DEFAULT_PROVIDER_BUDGET;
use crate::resolver::DEFAULT_RESOLVE_TIMEOUT;
use crate::types::{ProviderDescriptor, ProviderKind};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub id: String,
    /// Lower is tried first
    pub priority: i32,
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl ProviderConfig {
    pub fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor {
            id: self.id.clone(),
            priority: self.priority,
            kind: self.kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverConfig {
    pub providers: Vec<ProviderConfig>,
    pub client: ClientConfig,
    /// Minimum title confidence for a search candidate
    pub match_threshold: f64,
    /// Upper bound for one provider attempt, search to resolved sources
    pub provider_budget_secs: u64,
    pub resolver_timeout_secs: u64,
    /// 0 disables the cache
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
    /// Catalog API used to turn numeric ids into titles
    pub catalog_base_url: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                ProviderConfig {
                    id: "pahe".to_string(),
                    priority: 0,
                    kind: ProviderKind::ApiBacked,
                    base_url: "https://animepahe.ru".to_string(),
                    enabled: true,
                },
                ProviderConfig {
                    id: "gogo".to_string(),
                    priority: 1,
                    kind: ProviderKind::HtmlScraped,
                    base_url: "https://anitaku.to".to_string(),
                    enabled: true,
                },
            ],
            client: ClientConfig::default(),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            provider_budget_secs: DEFAULT_PROVIDER_BUDGET.as_secs(),
            resolver_timeout_secs: DEFAULT_RESOLVE_TIMEOUT.as_secs(),
            cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            catalog_base_url: None,
        }
    }
}

impl ResolverConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(ConfigError::Invalid(format!(
                "matchThreshold must be within 0..=1, got {}",
                self.match_threshold
            )));
        }
        if self.provider_budget_secs == 0 {
            return Err(ConfigError::Invalid("providerBudgetSecs must be positive".to_string()));
        }
        if self.resolver_timeout_secs == 0 {
            return Err(ConfigError::Invalid("resolverTimeoutSecs must be positive".to_string()));
        }
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.id.trim().is_empty() {
                return Err(ConfigError::Invalid("provider id must not be empty".to_string()));
            }
            if !seen.insert(provider.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate provider id `{}`",
                    provider.id
                )));
            }
            if ::url::Url::parse(&provider.base_url).is_err() {
                return Err(ConfigError::Invalid(format!(
                    "provider `{}` has invalid baseUrl `{}`",
                    provider.id, provider.base_url
                )));
            }
        }
        Ok(())
    }

    /// Enabled providers in priority order
    pub fn enabled_providers(&self) -> Vec<&ProviderConfig> {
        let mut enabled: Vec<&ProviderConfig> =
            self.providers.iter().filter(|p| p.enabled).collect();
        enabled.sort_by_key(|p| p.priority);
        enabled
    }

    pub fn provider_budget(&self) -> Duration {
        Duration::from_secs(self.provider_budget_secs)
    }

    pub fn resolver_timeout(&self) -> Duration {
        Duration::from_secs(self.resolver_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

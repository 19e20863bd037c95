//! Sequential provider fallback
//!
//! One generic loop over the registry: search, list, locate the episode,
//! collect entry points, resolve them, rank. The first provider that ends
//! with a non-empty source list wins. Providers are never raced; the entry
//! points of a single provider are resolved concurrently.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::{Instant, timeout_at};

use crate::error::{ProviderAttempt, ProviderFailure, ResolveError, Result};
use crate::matching::{DEFAULT_MATCH_THRESHOLD, best_match};
use crate::providers::ProviderClient;
use crate::quality;
use crate::resolver::PlayerResolver;
use crate::types::{ProviderDescriptor, ResolutionResult, StreamSource};

pub const DEFAULT_PROVIDER_BUDGET: Duration = Duration::from_secs(15);

/// Step of one provider attempt, used in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Searching,
    Listing,
    EntryLookup,
    Resolving,
    Done,
    Exhausted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Searching => "searching",
            Stage::Listing => "listing",
            Stage::EntryLookup => "entry-lookup",
            Stage::Resolving => "resolving",
            Stage::Done => "done",
            Stage::Exhausted => "exhausted",
        };
        f.write_str(name)
    }
}

/// Walks providers in priority order until one yields playable sources
pub struct FallbackOrchestrator {
    providers: Vec<Arc<dyn ProviderClient>>,
    resolver: Arc<PlayerResolver>,
    match_threshold: f64,
    provider_budget: Duration,
}

impl fmt::Debug for FallbackOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackOrchestrator")
            .field("providers", &self.providers.iter().map(|p| p.id()).collect::<Vec<_>>())
            .field("resolver", &self.resolver)
            .field("match_threshold", &self.match_threshold)
            .field("provider_budget", &self.provider_budget)
            .finish()
    }
}

impl FallbackOrchestrator {
    /// Providers are sorted by ascending priority; equal priorities keep
    /// their given order.
    pub fn new(mut providers: Vec<Arc<dyn ProviderClient>>, resolver: PlayerResolver) -> Self {
        providers.sort_by_key(|p| p.descriptor().priority);
        Self {
            providers,
            resolver: Arc::new(resolver),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            provider_budget: DEFAULT_PROVIDER_BUDGET,
        }
    }

    pub fn with_match_threshold(mut self, threshold: f64) -> Self {
        self.match_threshold = threshold;
        self
    }

    pub fn with_provider_budget(mut self, budget: Duration) -> Self {
        self.provider_budget = budget;
        self
    }

    /// Registry entries in the order they are tried
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        self.providers.iter().map(|p| p.descriptor().clone()).collect()
    }

    pub fn has_provider(&self, id: &str) -> bool {
        self.providers.iter().any(|p| p.id() == id)
    }

    /// Resolves one episode
    ///
    /// With `only` set, exactly that provider is attempted. A transport
    /// failure of that single provider is reported as `ProviderUnavailable`.
    pub async fn resolve(
        &self,
        title: &str,
        episode: f64,
        only: Option<&str>,
    ) -> Result<ResolutionResult> {
        let selected: Vec<&Arc<dyn ProviderClient>> = match only {
            Some(id) => {
                let provider = self
                    .providers
                    .iter()
                    .find(|p| p.id() == id)
                    .ok_or_else(|| ResolveError::invalid(format!("unknown provider `{}`", id)))?;
                vec![provider]
            }
            None => self.providers.iter().collect(),
        };

        let mut attempts: Vec<ProviderAttempt> = Vec::with_capacity(selected.len());
        for provider in selected {
            let id = provider.id();
            let deadline = Instant::now() + self.provider_budget;
            let outcome = self.attempt(provider.as_ref(), title, episode, deadline).await;

            match outcome {
                Ok(sources) => {
                    tracing::info!(provider = id, stage = %Stage::Done, count = sources.len(), "resolved");
                    return Ok(ResolutionResult {
                        sources,
                        provider_used: id.to_string(),
                        resolved_at: Utc::now(),
                    });
                }
                Err(failure) => {
                    tracing::warn!(provider = id, reason = %failure, "provider attempt failed");
                    attempts.push(ProviderAttempt {
                        provider_id: id.to_string(),
                        failure,
                    });
                }
            }
        }

        tracing::warn!(stage = %Stage::Exhausted, title, episode, attempts = attempts.len(), "no provider produced sources");

        if only.is_some()
            && let [attempt] = attempts.as_slice()
            && attempt.failure.is_transport()
        {
            return Err(ResolveError::ProviderUnavailable {
                provider: attempt.provider_id.clone(),
                reason: attempt.failure.clone(),
            });
        }
        Err(ResolveError::AllProvidersExhausted { attempts })
    }

    fn timed_out(&self) -> ProviderFailure {
        ProviderFailure::TimedOut {
            budget_ms: self.provider_budget.as_millis() as u64,
        }
    }

    /// One provider from search to ranked sources, bounded by `deadline`
    ///
    /// Sources already resolved when the deadline passes are kept.
    async fn attempt(
        &self,
        provider: &dyn ProviderClient,
        title: &str,
        episode: f64,
        deadline: Instant,
    ) -> std::result::Result<Vec<StreamSource>, ProviderFailure> {
        let id = provider.id();

        tracing::debug!(provider = id, stage = %Stage::Searching, title);
        let found = timeout_at(deadline, provider.search(title))
            .await
            .map_err(|_| self.timed_out())?;
        let Some(matched) = best_match(&found.items, id, self.match_threshold) else {
            return Err(found.failure.unwrap_or(ProviderFailure::NoTitleMatch));
        };
        tracing::debug!(
            provider = id,
            external_id = %matched.external_id,
            matched_title = %matched.matched_title,
            confidence = matched.confidence,
            "title matched"
        );

        tracing::debug!(provider = id, stage = %Stage::Listing);
        let listed = timeout_at(deadline, provider.list_episodes(&matched.external_id))
            .await
            .map_err(|_| self.timed_out())?;
        let Some(found_episode) = listed.items.iter().find(|e| e.number == episode) else {
            return Err(listed
                .failure
                .unwrap_or(ProviderFailure::EpisodeNotFound { episode }));
        };

        tracing::debug!(provider = id, stage = %Stage::EntryLookup, episode_id = %found_episode.episode_id);
        let entries = timeout_at(
            deadline,
            provider.get_entry_points(&matched.external_id, &found_episode.episode_id),
        )
        .await
        .map_err(|_| self.timed_out())?;
        if entries.is_empty() {
            return Err(entries.failure.unwrap_or(ProviderFailure::NoEntryPoints));
        }

        tracing::debug!(provider = id, stage = %Stage::Resolving, entries = entries.items.len());
        let mut pending: FuturesUnordered<_> = entries
            .items
            .iter()
            .enumerate()
            .map(|(index, entry)| async move { (index, self.resolver.resolve(entry).await) })
            .collect();

        let mut resolved: Vec<(usize, Vec<StreamSource>)> = Vec::with_capacity(entries.items.len());
        let mut expired = false;
        loop {
            match timeout_at(deadline, pending.next()).await {
                Ok(Some(done)) => resolved.push(done),
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        provider = id,
                        finished = resolved.len(),
                        unfinished = pending.len(),
                        "budget spent while resolving, keeping finished entries"
                    );
                    expired = true;
                    break;
                }
            }
        }

        // Input order breaks quality ties, not completion order.
        resolved.sort_by_key(|(index, _)| *index);
        let sources: Vec<StreamSource> = resolved.into_iter().flat_map(|(_, s)| s).collect();
        if sources.is_empty() {
            return Err(if expired { self.timed_out() } else { ProviderFailure::NoSources });
        }
        Ok(quality::rank(sources))
    }
}

//! Content providers
//!
//! A provider turns a title into candidate ids, an id into an episode list
//! and an episode into entry points. Providers never fail loudly: every
//! method returns a [`Lookup`], which is empty when nothing was found and
//! remembers the transport error when the emptiness came from the network.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::error::{ExtractError, ProviderFailure, TransportError};
use crate::types::{EntryPoint, EpisodeDescriptor, ProviderDescriptor, SearchResult};

mod api;
mod scraped;

pub use api::{ApiBackedProvider, ApiLayout};
pub use scraped::{HtmlScrapedProvider, ScrapeLayout};

/// Outcome of one provider call
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<T> {
    pub items: Vec<T>,
    /// Set when the call, or its last fallback tier, failed in transport
    pub failure: Option<ProviderFailure>,
}

impl<T> Lookup<T> {
    pub fn found(items: Vec<T>) -> Self {
        Self {
            items,
            failure: None,
        }
    }

    pub fn empty() -> Self {
        Self::found(Vec::new())
    }

    pub fn failed(failure: impl Into<ProviderFailure>) -> Self {
        Self {
            items: Vec::new(),
            failure: Some(failure.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> From<TransportError> for Lookup<T> {
    fn from(e: TransportError) -> Self {
        Self::failed(&e)
    }
}

impl<T> From<ExtractError> for Lookup<T> {
    fn from(e: ExtractError) -> Self {
        Self::failed(e)
    }
}

/// Capability set every content provider implements
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Static registry entry of this provider
    fn descriptor(&self) -> &ProviderDescriptor;

    fn id(&self) -> &str {
        &self.descriptor().id
    }

    /// Candidate ids for a title, each scored against the query
    async fn search(&self, title: &str) -> Lookup<SearchResult>;

    /// Episodes known for an external id
    async fn list_episodes(&self, external_id: &str) -> Lookup<EpisodeDescriptor>;

    /// Playable or embeddable locations for one episode
    async fn get_entry_points(&self, external_id: &str, episode_id: &str) -> Lookup<EntryPoint>;
}

/// Parses episode numbers such as "12", "10.5" or "Episode 7"
pub(crate) fn parse_episode_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if let Ok(n) = trimmed.parse::<f64>() {
        return n.is_finite().then_some(n);
    }
    // Last numeric token wins: "EP 3" → 3, "Season 2 Episode 5" → 5
    trimmed
        .split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .filter(|t| !t.is_empty() && t.chars().any(|c| c.is_ascii_digit()))
        .filter_map(|t| t.trim_matches('.').parse::<f64>().ok())
        .last()
}

static EPISODE_SLUG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)episode-(\d+)(?:-(\d+))?(?:$|[^0-9A-Za-z])").ok());

/// Episode number from a URL slug such as `/show-episode-10-5`
///
/// Only the digits right after `episode-` count; a second dash-separated
/// number is the decimal part, so `episode-1-5` is 1.5.
pub(crate) fn episode_number_from_slug(href: &str) -> Option<f64> {
    let caps = EPISODE_SLUG.as_ref()?.captures(href)?;
    let whole = caps.get(1)?.as_str();
    let number = match caps.get(2) {
        Some(fraction) => format!("{}.{}", whole, fraction.as_str()),
        None => whole.to_string(),
    };
    number.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_number_from_slug() {
        assert_eq!(episode_number_from_slug("/example-show-episode-1-5"), Some(1.5));
        assert_eq!(episode_number_from_slug("/example-show-episode-12"), Some(12.0));
        assert_eq!(episode_number_from_slug("https://site.example/show-2-Episode-3?x=1"), Some(3.0));
        assert_eq!(episode_number_from_slug("/show-episode-4-english-dub"), Some(4.0));
        assert_eq!(episode_number_from_slug("/show-season-2-5"), None);
        assert_eq!(episode_number_from_slug("/watch/12345"), None);
    }

    #[test]
    fn test_parse_episode_number() {
        assert_eq!(parse_episode_number("12"), Some(12.0));
        assert_eq!(parse_episode_number("10.5"), Some(10.5));
        assert_eq!(parse_episode_number("Episode 7"), Some(7.0));
        assert_eq!(parse_episode_number("EP 3."), Some(3.0));
        assert_eq!(parse_episode_number("Season 2 Episode 5"), Some(5.0));
        assert_eq!(parse_episode_number("Special"), None);
        assert_eq!(parse_episode_number("inf"), None);
    }

    #[test]
    fn test_lookup_from_transport_keeps_status() {
        let lookup: Lookup<SearchResult> = TransportError::Status {
            status: 500,
            url: "https://p.example/api".to_string(),
        }
        .into();
        assert!(lookup.is_empty());
        match lookup.failure {
            Some(ProviderFailure::TransportFailure { status, .. }) => assert_eq!(status, Some(500)),
            other => panic!("Expected TransportFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_lookup_found_has_no_failure() {
        let lookup = Lookup::found(vec![1, 2]);
        assert!(!lookup.is_empty());
        assert!(lookup.failure.is_none());
        assert!(Lookup::<u8>::empty().failure.is_none());
    }
}

//! Core data types for stream resolution
//!
//! All values here are created fresh per request. The only long-lived
//! ones are the [`ProviderDescriptor`]s of the static registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a provider is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderKind {
    /// JSON API first, HTML search page as a second tier
    ApiBacked,
    /// Plain HTML pages only
    HtmlScraped,
}

/// Static description of a provider in the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescriptor {
    pub id: String,
    /// Lower is tried first
    pub priority: i32,
    pub kind: ProviderKind,
}

/// Search candidate produced by one provider
///
/// Only usable with the provider named by `provider_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub provider_id: String,
    pub external_id: String,
    pub matched_title: String,
    /// Title similarity against the query, in `0.0..=1.0`
    pub confidence: f64,
}

/// Episode as listed by a provider
///
/// `episode_id` is opaque and only unique within `(provider_id, external_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeDescriptor {
    pub provider_id: String,
    pub episode_id: String,
    /// Fractional numbers such as `10.5` are allowed
    pub number: f64,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryKind {
    /// Playable as-is
    DirectMedia,
    /// Player page that has to be unwrapped
    EmbedPage,
}

/// Raw playable location returned for an episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPoint {
    pub url: String,
    pub kind: EntryKind,
    pub provider_id: String,
    /// Quality advertised by the provider next to the link, if any
    pub quality_hint: Option<String>,
    /// Page the link was found on; some embed hosts refuse other referers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
}

impl EntryPoint {
    pub fn direct(url: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: EntryKind::DirectMedia,
            provider_id: provider_id.into(),
            quality_hint: None,
            referer: None,
        }
    }

    pub fn embed(url: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: EntryKind::EmbedPage,
            provider_id: provider_id.into(),
            quality_hint: None,
            referer: None,
        }
    }

    pub fn with_quality_hint(mut self, hint: impl Into<String>) -> Self {
        self.quality_hint = Some(hint.into());
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }
}

/// Quality label used when an embed page could not be unwrapped
pub const UNRESOLVED_IFRAME_LABEL: &str = "iframe/unresolved";

/// Quality label for direct media without a recognisable resolution
pub const DIRECT_LABEL: &str = "direct";

/// Concrete stream location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSource {
    pub url: String,
    /// e.g. "1080p", "default", "iframe/unresolved"
    pub quality_label: String,
    /// Derived from `quality_label`
    pub quality_rank: u32,
    pub is_hls: bool,
    /// Container hint such as "m3u8" or "mp4"
    pub container: Option<String>,
}

impl StreamSource {
    /// Builds a source, deriving rank, HLS flag and container from the inputs
    pub fn new(url: impl Into<String>, quality_label: impl Into<String>) -> Self {
        let url = url.into();
        let quality_label = quality_label.into();
        let container = crate::parser::container_from_url(&url);
        Self {
            quality_rank: crate::quality::quality_rank(&quality_label),
            is_hls: container.as_deref() == Some("m3u8"),
            container,
            url,
            quality_label,
        }
    }

    /// Fallback source for an embed page no strategy could unwrap
    pub fn unresolved_iframe(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            quality_label: UNRESOLVED_IFRAME_LABEL.to_string(),
            quality_rank: 0,
            is_hls: false,
            container: None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        self.quality_label == UNRESOLVED_IFRAME_LABEL
    }
}

/// Successful resolution: ranked sources from exactly one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    /// Non-empty, sorted descending by `quality_rank`
    pub sources: Vec<StreamSource>,
    pub provider_used: String,
    pub resolved_at: DateTime<Utc>,
}

/// Input of a resolution call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub title: String,
    pub episode: f64,
    #[serde(default)]
    pub preferred_provider: Option<String>,
    #[serde(default)]
    pub force_refresh: bool,
}

impl ResolveRequest {
    pub fn new(title: impl Into<String>, episode: f64) -> Self {
        Self {
            title: title.into(),
            episode,
            preferred_provider: None,
            force_refresh: false,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.preferred_provider = Some(provider.into());
        self
    }

    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_source_derives_fields() {
        let source = StreamSource::new("https://cdn.example/v/1080/master.m3u8?t=1", "1080p");
        assert_eq!(source.quality_rank, 1080);
        assert!(source.is_hls);
        assert_eq!(source.container.as_deref(), Some("m3u8"));

        let mp4 = StreamSource::new("https://cdn.example/ep1.mp4", "default");
        assert_eq!(mp4.quality_rank, 0);
        assert!(!mp4.is_hls);
        assert_eq!(mp4.container.as_deref(), Some("mp4"));
    }

    #[test]
    fn test_unresolved_iframe() {
        let source = StreamSource::unresolved_iframe("https://embed.example/e/abc");
        assert!(source.is_unresolved());
        assert_eq!(source.quality_label, "iframe/unresolved");
        assert_eq!(source.quality_rank, 0);
        assert!(!source.is_hls);
    }

    #[test]
    fn test_entry_point_serialization() {
        let entry = EntryPoint::embed("https://kwik.example/e/x", "pahe").with_quality_hint("720");
        let json = serde_json::to_value(&entry).expect("Serialization should succeed");
        assert_eq!(json["kind"], "embedPage");
        assert_eq!(json["providerId"], "pahe");
        assert_eq!(json["qualityHint"], "720");
    }

    #[test]
    fn test_resolve_request_builder() {
        let request = ResolveRequest::new("Example Show", 3.0)
            .with_provider("gogo")
            .force_refresh(true);
        assert_eq!(request.preferred_provider.as_deref(), Some("gogo"));
        assert!(request.force_refresh);
    }
}

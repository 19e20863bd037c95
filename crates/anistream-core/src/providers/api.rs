//! JSON-API provider with an HTML search fallback
//!
//! Search goes to the provider's `/api?m=search` endpoint first. When that
//! call fails, or none of its hits clears the match threshold, the HTML
//! search page is scraped instead and its links supply the session ids.

use async_trait::async_trait;
use serde::Deserialize;

use crate::client::{Accept, HttpClient};
use crate::extract::{Attr, SelectorSpec, extract_rows};
use crate::matching::{DEFAULT_MATCH_THRESHOLD, title_confidence};
use crate::parser::container_from_url;
use crate::types::{EntryPoint, EpisodeDescriptor, ProviderDescriptor, SearchResult};
use crate::url::{absolutize, build_query_url, last_path_segment};

use super::{Lookup, ProviderClient, parse_episode_number};

/// Selectors and limits for an API-backed site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiLayout {
    /// Path of the HTML search page used as second tier
    pub search_page_path: String,
    /// Query parameter of the HTML search page
    pub search_page_param: String,
    /// One element per result on the HTML search page, carrying `href`
    pub search_row: String,
    /// Player buttons on the play page, carrying `data-src`
    pub player_button: String,
    /// Upper bound on release pages fetched per listing
    pub max_release_pages: u32,
}

impl Default for ApiLayout {
    fn default() -> Self {
        Self {
            search_page_path: "/search".to_string(),
            search_page_param: "q".to_string(),
            search_row: "a[href*='/anime/']".to_string(),
            player_button: "button[data-src]".to_string(),
            max_release_pages: 50,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    session: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    #[serde(default = "first_page")]
    last_page: u32,
    #[serde(default)]
    data: Vec<ReleaseItem>,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct ReleaseItem {
    episode: serde_json::Value,
    session: String,
    #[serde(default)]
    title: Option<String>,
}

impl ReleaseItem {
    fn number(&self) -> Option<f64> {
        match &self.episode {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => parse_episode_number(s),
            _ => None,
        }
    }
}

/// Provider reached through its own JSON API
#[derive(Debug, Clone)]
pub struct ApiBackedProvider {
    descriptor: ProviderDescriptor,
    base_url: String,
    http: HttpClient,
    layout: ApiLayout,
    match_threshold: f64,
}

impl ApiBackedProvider {
    pub fn new(descriptor: ProviderDescriptor, base_url: impl Into<String>, http: HttpClient) -> Self {
        Self {
            descriptor,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            layout: ApiLayout::default(),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }

    pub fn with_layout(mut self, layout: ApiLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Threshold below which API hits trigger the HTML tier
    pub fn with_match_threshold(mut self, threshold: f64) -> Self {
        self.match_threshold = threshold;
        self
    }

    fn candidate(&self, query: &str, external_id: String, matched_title: String) -> SearchResult {
        SearchResult {
            provider_id: self.descriptor.id.clone(),
            confidence: title_confidence(query, &matched_title),
            external_id,
            matched_title,
        }
    }

    fn has_match(&self, results: &[SearchResult]) -> bool {
        results.iter().any(|r| r.confidence >= self.match_threshold)
    }

    async fn search_api(&self, title: &str) -> Lookup<SearchResult> {
        let url = format!(
            "{}/api?m=search&q={}",
            self.base_url,
            urlencoding::encode(title)
        );
        match self.http.get_json::<SearchResponse>(&url).await {
            Ok(response) => Lookup::found(
                response
                    .data
                    .into_iter()
                    .map(|item| self.candidate(title, item.session, item.title))
                    .collect(),
            ),
            Err(e) => e.into(),
        }
    }

    async fn search_page(&self, title: &str) -> Lookup<SearchResult> {
        let url = build_query_url(
            &self.base_url,
            &self.layout.search_page_path,
            &self.layout.search_page_param,
            title,
        );
        let html = match self.http.get_text(&url, Accept::Html, None).await {
            Ok(html) => html,
            Err(e) => return e.into(),
        };

        let spec = SelectorSpec::new()
            .field("href", "", Attr::Href)
            .field("title", "", Attr::Named("title".to_string()))
            .field("text", "", Attr::Text);
        let rows = match extract_rows(&html, &self.layout.search_row, &spec) {
            Ok(rows) => rows,
            Err(e) => return e.into(),
        };

        let mut results: Vec<SearchResult> = Vec::new();
        for row in rows {
            let Some(id) = row.get("href").and_then(last_path_segment) else {
                continue;
            };
            let Some(name) = row.get("title").or_else(|| row.get("text")) else {
                continue;
            };
            if results.iter().any(|r| r.external_id == id) {
                continue;
            }
            results.push(self.candidate(title, id, name.to_string()));
        }
        Lookup::found(results)
    }

    fn release_url(&self, external_id: &str, page: u32) -> String {
        format!(
            "{}/api?m=release&id={}&sort=episode_asc&page={}",
            self.base_url,
            urlencoding::encode(external_id),
            page
        )
    }
}

#[async_trait]
impl ProviderClient for ApiBackedProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn search(&self, title: &str) -> Lookup<SearchResult> {
        let api = self.search_api(title).await;
        if self.has_match(&api.items) {
            return api;
        }

        match &api.failure {
            Some(failure) => tracing::info!(
                provider = %self.descriptor.id,
                %failure,
                "search API failed, scraping search page"
            ),
            None => tracing::debug!(
                provider = %self.descriptor.id,
                hits = api.items.len(),
                "search API had no confident match, scraping search page"
            ),
        }

        let page = self.search_page(title).await;
        if self.has_match(&page.items) {
            return page;
        }

        let mut items = api.items;
        items.extend(page.items);
        let failure = if items.is_empty() {
            page.failure.or(api.failure)
        } else {
            None
        };
        Lookup { items, failure }
    }

    async fn list_episodes(&self, external_id: &str) -> Lookup<EpisodeDescriptor> {
        let mut episodes = Vec::new();
        let mut page = 1;
        let mut last_page = 1;

        while page <= last_page.min(self.layout.max_release_pages) {
            let response = match self
                .http
                .get_json::<ReleaseResponse>(&self.release_url(external_id, page))
                .await
            {
                Ok(response) => response,
                Err(e) if page == 1 => return e.into(),
                Err(e) => {
                    tracing::warn!(
                        provider = %self.descriptor.id,
                        page,
                        error = %e,
                        "release page failed, keeping earlier pages"
                    );
                    break;
                }
            };

            last_page = response.last_page.max(1);
            for item in response.data {
                let Some(number) = item.number() else {
                    continue;
                };
                episodes.push(EpisodeDescriptor {
                    provider_id: self.descriptor.id.clone(),
                    episode_id: item.session,
                    number,
                    title: item.title.filter(|t| !t.trim().is_empty()),
                });
            }
            page += 1;
        }

        Lookup::found(episodes)
    }

    async fn get_entry_points(&self, external_id: &str, episode_id: &str) -> Lookup<EntryPoint> {
        let url = format!(
            "{}/play/{}/{}",
            self.base_url,
            urlencoding::encode(external_id),
            urlencoding::encode(episode_id)
        );
        let html = match self.http.get_text(&url, Accept::Html, Some(self.base_url.as_str())).await {
            Ok(html) => html,
            Err(e) => return e.into(),
        };

        let spec = SelectorSpec::new()
            .field("src", "", Attr::Named("data-src".to_string()))
            .field("resolution", "", Attr::Named("data-resolution".to_string()))
            .field("av1", "", Attr::Named("data-av1".to_string()));
        let rows = match extract_rows(&html, &self.layout.player_button, &spec) {
            Ok(rows) => rows,
            Err(e) => return e.into(),
        };

        let mut entries: Vec<EntryPoint> = Vec::new();
        for row in rows {
            // AV1 variants are not playable in most browsers
            if row.get("av1") == Some("1") {
                continue;
            }
            let Some(src) = row.get("src").and_then(|s| absolutize(&url, s)) else {
                continue;
            };
            if entries.iter().any(|e| e.url == src) {
                continue;
            }
            let mut entry = match container_from_url(&src) {
                Some(_) => EntryPoint::direct(src, &self.descriptor.id),
                None => EntryPoint::embed(src, &self.descriptor.id)
                    .with_referer(format!("{}/", self.base_url)),
            };
            if let Some(resolution) = row.get("resolution") {
                entry = entry.with_quality_hint(resolution);
            }
            entries.push(entry);
        }

        if entries.is_empty() {
            tracing::debug!(provider = %self.descriptor.id, %url, "play page had no player buttons");
        }
        Lookup::found(entries)
    }
}

//! Embed page unwrapping
//!
//! [`PlayerResolver`] turns an [`EntryPoint`] into concrete stream sources.
//! Direct media passes through untouched. Embed pages are fetched and handed
//! to the first registered [`EmbedStrategy`] that claims the host and finds
//! something. When none does, the embed URL itself comes back labelled
//! `iframe/unresolved` so callers still get a playable iframe.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::client::{Accept, HttpClient};
use crate::extract::{Attr, SelectorSpec, extract_rows};
use crate::parser::{
    container_from_url, expand_packed, find_media_url, find_script_assignment, label_from_url,
    parse_jwplayer_sources, parse_videojs_sources,
};
use crate::types::{DIRECT_LABEL, EntryKind, EntryPoint, StreamSource};
use crate::url::{absolutize, host_of, origin_of, query_param};

pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetched embed page handed to strategies
#[derive(Debug, Clone, Copy)]
pub struct EmbedPage<'a> {
    pub url: &'a str,
    /// Page text with packed scripts already expanded
    pub html: &'a str,
    pub quality_hint: Option<&'a str>,
}

/// One way of unwrapping a family of embed hosts
#[async_trait]
pub trait EmbedStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this strategy knows how to handle the embed URL
    fn matches(&self, url: &str) -> bool;

    /// Sources found on the page; empty when nothing usable was found
    async fn extract(&self, page: &EmbedPage<'_>, http: &HttpClient) -> Vec<StreamSource>;
}

/// Label from the provider's hint, then the URL, then `fallback`
///
/// A bare number hint such as "720" becomes "720p".
fn hinted_label(hint: Option<&str>, url: &str, fallback: &str) -> String {
    match hint.map(str::trim).filter(|h| !h.is_empty()) {
        Some(h) if h.chars().all(|c| c.is_ascii_digit()) => format!("{}p", h),
        Some(h) => h.to_string(),
        None => label_from_url(url, fallback),
    }
}

fn host_matches(url: &str, hosts: &[String]) -> bool {
    host_of(url).is_some_and(|host| hosts.iter().any(|h| host.contains(h.as_str())))
}

/// Kwik-style players: a packed script assigning `source='...m3u8'`
#[derive(Debug, Clone)]
pub struct KwikStrategy {
    hosts: Vec<String>,
}

impl Default for KwikStrategy {
    fn default() -> Self {
        Self {
            hosts: vec!["kwik".to_string()],
        }
    }
}

impl KwikStrategy {
    /// Claims hosts containing any of the given fragments
    pub fn with_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl EmbedStrategy for KwikStrategy {
    fn name(&self) -> &str {
        "kwik"
    }

    fn matches(&self, url: &str) -> bool {
        host_matches(url, &self.hosts)
    }

    async fn extract(&self, page: &EmbedPage<'_>, _http: &HttpClient) -> Vec<StreamSource> {
        let url = find_script_assignment(page.html, &["source"])
            .filter(|u| container_from_url(u).is_some())
            .or_else(|| find_media_url(page.html));

        match url {
            Some(url) => {
                let label = hinted_label(page.quality_hint, &url, "default");
                vec![StreamSource::new(url, label)]
            }
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SourceFile {
    file: String,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SourceListing {
    #[serde(default)]
    source: Vec<SourceFile>,
    #[serde(default)]
    source_bk: Vec<SourceFile>,
}

/// Players exposing their files at `{origin}/source?id=<id>`
///
/// The id is taken from the embed URL's `id` query parameter.
#[derive(Debug, Clone)]
pub struct SourceEndpointStrategy {
    hosts: Vec<String>,
    paths: Vec<String>,
}

impl Default for SourceEndpointStrategy {
    fn default() -> Self {
        Self {
            hosts: ["gogo", "vidstream", "embtaku", "playtaku"]
                .into_iter()
                .map(String::from)
                .collect(),
            paths: vec!["/streaming.php".to_string(), "/embedplus".to_string()],
        }
    }
}

impl SourceEndpointStrategy {
    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait]
impl EmbedStrategy for SourceEndpointStrategy {
    fn name(&self) -> &str {
        "source-endpoint"
    }

    fn matches(&self, url: &str) -> bool {
        if host_matches(url, &self.hosts) {
            return true;
        }
        ::url::Url::parse(url).is_ok_and(|u| {
            u.query_pairs().any(|(k, _)| k == "id")
                && self.paths.iter().any(|p| u.path().starts_with(p.as_str()))
        })
    }

    async fn extract(&self, page: &EmbedPage<'_>, http: &HttpClient) -> Vec<StreamSource> {
        let (Some(origin), Some(id)) = (origin_of(page.url), query_param(page.url, "id")) else {
            return Vec::new();
        };
        let endpoint = format!("{}/source?id={}", origin, urlencoding::encode(&id));

        let listing: SourceListing = match http.get_json(&endpoint).await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::debug!(endpoint, error = %e, "source endpoint unavailable");
                return Vec::new();
            }
        };

        let mut sources: Vec<StreamSource> = Vec::new();
        for file in listing.source.into_iter().chain(listing.source_bk) {
            if file.file.trim().is_empty() || sources.iter().any(|s| s.url == file.file) {
                continue;
            }
            let label = file
                .label
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| hinted_label(page.quality_hint, &file.file, "default"));
            sources.push(StreamSource::new(file.file, label));
        }
        sources
    }
}

/// Generic player pages: VideoJS, JWPlayer, `<video>` tags and named source
/// assignments such as `file: "..."`
///
/// Only recognised player setups count. A page-wide scan for any `.m3u8` or
/// `.mp4` URL runs solely for hosts opted in with [`Self::with_scan_hosts`];
/// on every other host an unrecognised page stays unresolved.
#[derive(Debug, Clone, Default)]
pub struct PlayerScriptStrategy {
    scan_hosts: Vec<String>,
}

impl PlayerScriptStrategy {
    pub fn with_scan_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scan_hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }
}

const SCRIPT_SOURCE_NAMES: &[&str] = &["file", "hls", "hlsUrl", "videoUrl", "source", "src"];

#[async_trait]
impl EmbedStrategy for PlayerScriptStrategy {
    fn name(&self) -> &str {
        "player-script"
    }

    fn matches(&self, _url: &str) -> bool {
        true
    }

    async fn extract(&self, page: &EmbedPage<'_>, _http: &HttpClient) -> Vec<StreamSource> {
        let sources = parse_videojs_sources(page.html);
        if !sources.is_empty() {
            return sources;
        }
        let sources = parse_jwplayer_sources(page.html);
        if !sources.is_empty() {
            return sources;
        }

        let spec = SelectorSpec::new().field("src", "", Attr::Src);
        let tagged: Vec<String> = extract_rows(page.html, "video[src], video source[src]", &spec)
            .unwrap_or_default()
            .iter()
            .filter_map(|row| absolutize(page.url, row.get("src")?))
            .collect();
        if !tagged.is_empty() {
            return tagged
                .into_iter()
                .map(|url| {
                    let label = hinted_label(page.quality_hint, &url, "default");
                    StreamSource::new(url, label)
                })
                .collect();
        }

        let url = find_script_assignment(page.html, SCRIPT_SOURCE_NAMES)
            .and_then(|u| absolutize(page.url, &u))
            .filter(|u| container_from_url(u).is_some_and(|c| c == "m3u8" || c == "mp4"))
            .or_else(|| {
                host_matches(page.url, &self.scan_hosts)
                    .then(|| find_media_url(page.html))
                    .flatten()
            });
        match url {
            Some(url) => {
                let label = hinted_label(page.quality_hint, &url, "default");
                vec![StreamSource::new(url, label)]
            }
            None => Vec::new(),
        }
    }
}

/// Unwraps entry points into stream sources
pub struct PlayerResolver {
    http: HttpClient,
    strategies: Vec<Box<dyn EmbedStrategy>>,
    timeout: Duration,
}

impl fmt::Debug for PlayerResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerResolver")
            .field("strategies", &self.strategy_names())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PlayerResolver {
    /// Resolver with the built-in strategies, most specific first
    pub fn new(http: HttpClient) -> Self {
        Self::empty(http)
            .with_strategy(KwikStrategy::default())
            .with_strategy(SourceEndpointStrategy::default())
            .with_strategy(PlayerScriptStrategy::default())
    }

    /// Resolver without strategies; every embed stays unresolved
    pub fn empty(http: HttpClient) -> Self {
        Self {
            http,
            strategies: Vec::new(),
            timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    /// Appends a strategy, tried after the ones already registered
    pub fn with_strategy(mut self, strategy: impl EmbedStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Sources for one entry point
    ///
    /// Empty only when the embed page could not be fetched in time. An
    /// embed no strategy understands yields the `iframe/unresolved` source.
    pub async fn resolve(&self, entry: &EntryPoint) -> Vec<StreamSource> {
        match entry.kind {
            EntryKind::DirectMedia => {
                let label = hinted_label(entry.quality_hint.as_deref(), &entry.url, DIRECT_LABEL);
                vec![StreamSource::new(entry.url.clone(), label)]
            }
            EntryKind::EmbedPage => {
                match tokio::time::timeout(self.timeout, self.resolve_embed(entry)).await {
                    Ok(sources) => sources,
                    Err(_) => {
                        tracing::warn!(url = %entry.url, timeout = ?self.timeout, "embed resolution timed out");
                        Vec::new()
                    }
                }
            }
        }
    }

    async fn resolve_embed(&self, entry: &EntryPoint) -> Vec<StreamSource> {
        let html = match self
            .http
            .get_text(&entry.url, Accept::Html, entry.referer.as_deref())
            .await
        {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(url = %entry.url, error = %e, "embed page unavailable");
                return Vec::new();
            }
        };
        let expanded = expand_packed(&html);
        let page = EmbedPage {
            url: &entry.url,
            html: &expanded,
            quality_hint: entry.quality_hint.as_deref(),
        };

        for strategy in self.strategies.iter().filter(|s| s.matches(&entry.url)) {
            let sources = strategy.extract(&page, &self.http).await;
            if !sources.is_empty() {
                tracing::debug!(
                    url = %entry.url,
                    strategy = strategy.name(),
                    count = sources.len(),
                    "embed unwrapped"
                );
                return sources;
            }
        }

        tracing::info!(url = %entry.url, "no strategy unwrapped embed, returning iframe");
        vec![StreamSource::unresolved_iframe(entry.url.clone())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use crate::types::UNRESOLVED_IFRAME_LABEL;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param as qp};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http() -> HttpClient {
        HttpClient::with_config(&ClientConfig {
            requests_per_second: 0.0,
            timeout_secs: 2,
            max_retries: 0,
        })
        .unwrap()
    }

    fn page<'a>(url: &'a str, html: &'a str) -> EmbedPage<'a> {
        EmbedPage {
            url,
            html,
            quality_hint: None,
        }
    }

    #[test]
    fn test_hinted_label() {
        assert_eq!(hinted_label(Some("720"), "https://x/a.m3u8", "default"), "720p");
        assert_eq!(hinted_label(Some("1080p"), "https://x/a.m3u8", "default"), "1080p");
        assert_eq!(hinted_label(None, "https://x/480/a.m3u8", "default"), "480p");
        assert_eq!(hinted_label(Some("  "), "https://cdn/ex.mp4", DIRECT_LABEL), "direct");
    }

    #[test]
    fn test_strategy_matching() {
        let kwik = KwikStrategy::default();
        assert!(kwik.matches("https://kwik.si/e/abc"));
        assert!(!kwik.matches("https://embtaku.pro/streaming.php?id=1"));

        let endpoint = SourceEndpointStrategy::default();
        assert!(endpoint.matches("https://embtaku.pro/streaming.php?id=1"));
        assert!(endpoint.matches("http://127.0.0.1:9/streaming.php?id=1"));
        assert!(!endpoint.matches("http://127.0.0.1:9/streaming.php"));
        assert!(!endpoint.matches("https://mirror.example/e/xyz"));

        assert!(PlayerScriptStrategy::default().matches("https://anything.example/"));
    }

    #[tokio::test]
    async fn test_kwik_reads_packed_source() {
        let html = r#"<html><script>eval(function(p,a,c,k,e,d){return p}('0 1=\'2://3.4/5/6.7\';',8,8,'const|source|https|cdn|example|hls|master|m3u8'.split('|'),0,{}))</script></html>"#;
        let expanded = expand_packed(html);
        let page = EmbedPage {
            url: "https://kwik.si/e/abc",
            html: &expanded,
            quality_hint: Some("720"),
        };

        let sources = KwikStrategy::default().extract(&page, &http()).await;
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].url, "https://cdn.example/hls/master.m3u8");
        assert_eq!(sources[0].quality_label, "720p");
        assert_eq!(sources[0].quality_rank, 720);
        assert!(sources[0].is_hls);
    }

    #[tokio::test]
    async fn test_player_script_variants() {
        let http = http();
        let strategy = PlayerScriptStrategy::default();

        let jw = r#"<script>jwplayer("v").setup({sources:[{file:"https://cdn.example/a/720.m3u8",label:"720p"},{file:"https://cdn.example/subs.vtt",label:"English"}]});</script>"#;
        let sources = strategy.extract(&page("https://p.example/e/1", jw), &http).await;
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].quality_label, "720p");

        let video = r#"<html><body><video src="/media/ep1-1080p.mp4"></video></body></html>"#;
        let sources = strategy.extract(&page("https://p.example/e/1", video), &http).await;
        assert_eq!(sources[0].url, "https://p.example/media/ep1-1080p.mp4");
        assert_eq!(sources[0].quality_label, "1080p");

        let bare = r#"<script>var player = {hls: "https://cdn.example/x/master.m3u8"};</script>"#;
        let sources = strategy.extract(&page("https://p.example/e/1", bare), &http).await;
        assert_eq!(sources[0].url, "https://cdn.example/x/master.m3u8");
        assert_eq!(sources[0].quality_label, "default");

        let nothing = "<html><body><p>Video removed</p></body></html>";
        assert!(strategy.extract(&page("https://p.example/e/1", nothing), &http).await.is_empty());
    }

    #[tokio::test]
    async fn test_direct_media_passes_through() {
        let resolver = PlayerResolver::new(http());
        let sources = resolver
            .resolve(&EntryPoint::direct("https://cdn/ex.mp4", "pahe"))
            .await;
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].url, "https://cdn/ex.mp4");
        assert_eq!(sources[0].quality_label, "direct");
        assert_eq!(sources[0].quality_rank, 0);
        assert_eq!(sources[0].container.as_deref(), Some("mp4"));
    }

    #[tokio::test]
    async fn test_source_endpoint_hop() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/streaming.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body><div id=\"player\"></div></body></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/source"))
            .and(qp("id", "MTIz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "source": [{"file": "https://cdn.example/ep1/index.m3u8", "label": "hls P"}],
                "source_bk": [
                    {"file": "https://cdn.example/ep1/index.m3u8", "label": "hls P"},
                    {"file": "https://backup.example/ep1-720p.mp4", "label": "720 P"}
                ]
            })))
            .mount(&server)
            .await;

        let resolver = PlayerResolver::new(http());
        let entry = EntryPoint::embed(format!("{}/streaming.php?id=MTIz", server.uri()), "gogo");
        let sources = resolver.resolve(&entry).await;

        assert_eq!(sources.len(), 2);
        assert!(sources[0].is_hls);
        assert_eq!(sources[1].quality_rank, 720);
    }

    #[tokio::test]
    async fn test_unknown_embed_stays_iframe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/e/xyz"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>obfuscated</body></html>"))
            .mount(&server)
            .await;

        let url = format!("{}/e/xyz", server.uri());
        let sources = PlayerResolver::new(http())
            .resolve(&EntryPoint::embed(url.clone(), "gogo"))
            .await;
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].url, url);
        assert_eq!(sources[0].quality_label, UNRESOLVED_IFRAME_LABEL);
        assert_eq!(sources[0].quality_rank, 0);

        let sources = PlayerResolver::empty(http())
            .resolve(&EntryPoint::embed(url.clone(), "gogo"))
            .await;
        assert!(sources[0].is_unresolved());
    }

    #[tokio::test]
    async fn test_embed_transport_failure_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let entry = EntryPoint::embed(format!("{}/e/gone", server.uri()), "gogo");
        assert!(PlayerResolver::new(http()).resolve(&entry).await.is_empty());
    }

    #[tokio::test]
    async fn test_embed_timeout_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html></html>")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let resolver = PlayerResolver::new(http()).with_timeout(Duration::from_millis(50));
        let entry = EntryPoint::embed(format!("{}/e/slow", server.uri()), "gogo");
        assert!(resolver.resolve(&entry).await.is_empty());
    }

    #[test]
    fn test_builtin_strategy_order() {
        let resolver = PlayerResolver::new(http());
        assert_eq!(
            resolver.strategy_names(),
            vec!["kwik", "source-endpoint", "player-script"]
        );
    }

    #[tokio::test]
    async fn test_stray_media_url_on_unknown_host_stays_iframe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/e/ad"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><script>var preroll = "https://ads.example/promo.mp4";</script><div id="player"></div></html>"#,
            ))
            .mount(&server)
            .await;
        let url = format!("{}/e/ad", server.uri());

        let sources = PlayerResolver::new(http())
            .resolve(&EntryPoint::embed(url.clone(), "gogo"))
            .await;
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].url, url);
        assert_eq!(sources[0].quality_label, UNRESOLVED_IFRAME_LABEL);

        let scanning = PlayerResolver::empty(http())
            .with_strategy(PlayerScriptStrategy::with_scan_hosts(["127.0.0.1"]));
        let sources = scanning.resolve(&EntryPoint::embed(url, "gogo")).await;
        assert_eq!(sources[0].url, "https://ads.example/promo.mp4");
    }

    #[tokio::test]
    async fn test_concurrent_embeds_on_distinct_hosts_do_not_queue() {
        let mut servers = Vec::new();
        for _ in 0..6 {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200).set_body_string(
                    r#"<video src="https://cdn.example/ep1-720p.mp4"></video>"#,
                ))
                .mount(&server)
                .await;
            servers.push(server);
        }

        let resolver = PlayerResolver::new(
            HttpClient::with_config(&ClientConfig {
                requests_per_second: 2.0,
                timeout_secs: 2,
                max_retries: 0,
            })
            .unwrap(),
        );
        let entries: Vec<EntryPoint> = servers
            .iter()
            .map(|s| EntryPoint::embed(format!("{}/e/1", s.uri()), "gogo"))
            .collect();

        let started = std::time::Instant::now();
        let resolved = futures::future::join_all(entries.iter().map(|e| resolver.resolve(e))).await;
        assert!(started.elapsed() < Duration::from_millis(1000));
        assert!(resolved.iter().all(|sources| sources[0].quality_label == "720p"));
    }
}

//! Provider read entirely from HTML pages
//!
//! Search page → first matching detail link → detail page episode list →
//! episode page player links. External and episode ids are the site paths
//! of the detail and episode pages.

use async_trait::async_trait;

use crate::client::{Accept, HttpClient};
use crate::error::TransportError;
use crate::extract::{Attr, SelectorSpec, extract_rows};
use crate::matching::title_confidence;
use crate::parser::container_from_url;
use crate::types::{EntryPoint, EpisodeDescriptor, ProviderDescriptor, SearchResult};
use crate::url::{absolutize, build_query_url};

use super::{Lookup, ProviderClient, episode_number_from_slug, parse_episode_number};

/// Selectors for an HTML-scraped site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeLayout {
    pub search_path: String,
    pub search_param: String,
    /// One link per search result
    pub search_row: String,
    /// One link per episode on the detail page
    pub episode_row: String,
    /// Element inside an episode link holding its label; empty for the link text
    pub episode_label: String,
    /// Embed links on the episode page, as `(css, attribute)` pairs
    pub embed_links: Vec<(String, String)>,
    /// Direct media elements on the episode page, read through `src`
    pub direct_media: String,
}

impl Default for ScrapeLayout {
    fn default() -> Self {
        Self {
            search_path: "/search.html".to_string(),
            search_param: "keyword".to_string(),
            search_row: "ul.items li p.name a".to_string(),
            episode_row: "#episode_related li a".to_string(),
            episode_label: ".name".to_string(),
            embed_links: vec![
                (".anime_muti_link li a[data-video]".to_string(), "data-video".to_string()),
                ("iframe[src]".to_string(), "src".to_string()),
            ],
            direct_media: "video[src], video source[src]".to_string(),
        }
    }
}

/// Provider scraped from its public HTML pages
#[derive(Debug, Clone)]
pub struct HtmlScrapedProvider {
    descriptor: ProviderDescriptor,
    base_url: String,
    http: HttpClient,
    layout: ScrapeLayout,
}

impl HtmlScrapedProvider {
    pub fn new(descriptor: ProviderDescriptor, base_url: impl Into<String>, http: HttpClient) -> Self {
        Self {
            descriptor,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            layout: ScrapeLayout::default(),
        }
    }

    pub fn with_layout(mut self, layout: ScrapeLayout) -> Self {
        self.layout = layout;
        self
    }

    fn page_url(&self, site_path: &str) -> Option<String> {
        absolutize(&format!("{}/", self.base_url), site_path)
    }

    async fn fetch(&self, url: &str) -> Result<String, TransportError> {
        self.http
            .get_text(url, Accept::Html, Some(self.base_url.as_str()))
            .await
    }
}

/// Keeps the path (and query) of a link so ids stay host-independent
fn site_path(url: &str) -> String {
    match ::url::Url::parse(url) {
        Ok(parsed) => match parsed.query() {
            Some(q) => format!("{}?{}", parsed.path(), q),
            None => parsed.path().to_string(),
        },
        Err(_) => url.to_string(),
    }
}

#[async_trait]
impl ProviderClient for HtmlScrapedProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn search(&self, title: &str) -> Lookup<SearchResult> {
        let url = build_query_url(
            &self.base_url,
            &self.layout.search_path,
            &self.layout.search_param,
            title,
        );
        let html = match self.fetch(&url).await {
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
            let Some(link) = row.get("href").and_then(|href| absolutize(&url, href)) else {
                continue;
            };
            let Some(name) = row.get("title").or_else(|| row.get("text")) else {
                continue;
            };
            let external_id = site_path(&link);
            if results.iter().any(|r| r.external_id == external_id) {
                continue;
            }
            results.push(SearchResult {
                provider_id: self.descriptor.id.clone(),
                external_id,
                matched_title: name.to_string(),
                confidence: title_confidence(title, name),
            });
        }
        Lookup::found(results)
    }

    async fn list_episodes(&self, external_id: &str) -> Lookup<EpisodeDescriptor> {
        let Some(url) = self.page_url(external_id) else {
            return Lookup::empty();
        };
        let html = match self.fetch(&url).await {
            Ok(html) => html,
            Err(e) => return e.into(),
        };

        let spec = SelectorSpec::new()
            .field("href", "", Attr::Href)
            .field("label", self.layout.episode_label.clone(), Attr::Text)
            .field("text", "", Attr::Text);
        let rows = match extract_rows(&html, &self.layout.episode_row, &spec) {
            Ok(rows) => rows,
            Err(e) => return e.into(),
        };

        let mut episodes: Vec<EpisodeDescriptor> = rows
            .iter()
            .filter_map(|row| {
                let href = row.get("href")?;
                let label = row.get("label").or_else(|| row.get("text"));
                let number = label
                    .and_then(parse_episode_number)
                    .or_else(|| episode_number_from_slug(href))?;
                Some(EpisodeDescriptor {
                    provider_id: self.descriptor.id.clone(),
                    episode_id: site_path(&absolutize(&url, href)?),
                    number,
                    title: label.map(str::to_string),
                })
            })
            .collect();

        // Detail pages often list newest first
        episodes.sort_by(|a, b| a.number.total_cmp(&b.number));
        episodes.dedup_by(|a, b| a.episode_id == b.episode_id);
        Lookup::found(episodes)
    }

    async fn get_entry_points(&self, _external_id: &str, episode_id: &str) -> Lookup<EntryPoint> {
        let Some(url) = self.page_url(episode_id) else {
            return Lookup::empty();
        };
        let html = match self.fetch(&url).await {
            Ok(html) => html,
            Err(e) => return e.into(),
        };

        let mut entries: Vec<EntryPoint> = Vec::new();
        let mut push = |entry: EntryPoint| {
            if !entries.iter().any(|e| e.url == entry.url) {
                entries.push(entry);
            }
        };

        let direct = SelectorSpec::new().field("src", "", Attr::Src);
        match extract_rows(&html, &self.layout.direct_media, &direct) {
            Ok(rows) => {
                for src in rows.iter().filter_map(|r| r.get("src")) {
                    if let Some(src) = absolutize(&url, src) {
                        push(EntryPoint::direct(src, &self.descriptor.id));
                    }
                }
            }
            Err(e) => return e.into(),
        }

        for (css, attr) in &self.layout.embed_links {
            let spec = SelectorSpec::new().field("link", "", Attr::Named(attr.clone()));
            let rows = match extract_rows(&html, css, &spec) {
                Ok(rows) => rows,
                Err(e) => return e.into(),
            };
            for link in rows.iter().filter_map(|r| r.get("link")) {
                let Some(link) = absolutize(&url, link) else {
                    continue;
                };
                match container_from_url(&link) {
                    Some(_) => push(EntryPoint::direct(link, &self.descriptor.id)),
                    None => push(
                        EntryPoint::embed(link, &self.descriptor.id).with_referer(url.clone()),
                    ),
                }
            }
        }

        Lookup::found(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use crate::types::{EntryKind, ProviderKind};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> HtmlScrapedProvider {
        let http = HttpClient::with_config(&ClientConfig {
            requests_per_second: 0.0,
            timeout_secs: 2,
            max_retries: 0,
        })
        .unwrap();
        HtmlScrapedProvider::new(
            ProviderDescriptor {
                id: "gogo".to_string(),
                priority: 1,
                kind: ProviderKind::HtmlScraped,
            },
            server.uri(),
            http,
        )
    }

    #[test]
    fn test_site_path() {
        assert_eq!(site_path("https://p.example/category/show"), "/category/show");
        assert_eq!(site_path("https://p.example/watch?id=3"), "/watch?id=3");
    }

    #[tokio::test]
    async fn test_search_reads_result_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.html"))
            .and(query_param("keyword", "Example Show"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><ul class="items">
                    <li><p class="name"><a href="/category/example-show" title="Example Show">Example Show</a></p></li>
                    <li><p class="name"><a href="/category/example-show-dub" title="Example Show (Dub)">Example Show (Dub)</a></p></li>
                </ul></body></html>"#,
            ))
            .mount(&server)
            .await;

        let lookup = provider(&server).search("Example Show").await;
        assert_eq!(lookup.items.len(), 2);
        assert_eq!(lookup.items[0].external_id, "/category/example-show");
        assert_eq!(lookup.items[0].confidence, 1.0);
        assert!(lookup.items[1].confidence < 1.0);
    }

    #[tokio::test]
    async fn test_list_episodes_sorted_ascending() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/category/example-show"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><ul id="episode_related">
                    <li><a href="/example-show-episode-2"><div class="name">EP 2</div></a></li>
                    <li><a href="/example-show-episode-1-5"><div class="name">EP 1.5</div></a></li>
                    <li><a href="/example-show-episode-1"><div class="name">EP 1</div></a></li>
                </ul></body></html>"#,
            ))
            .mount(&server)
            .await;

        let lookup = provider(&server).list_episodes("/category/example-show").await;
        let numbers: Vec<f64> = lookup.items.iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![1.0, 1.5, 2.0]);
        assert_eq!(lookup.items[0].episode_id, "/example-show-episode-1");
    }

    #[tokio::test]
    async fn test_unlabelled_episode_links_read_the_slug() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/category/example-show"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><ul id="episode_related">
                    <li><a href="/example-show-episode-1-5"></a></li>
                    <li><a href="/example-show-episode-5"></a></li>
                    <li><a href="/example-show-2-preview"></a></li>
                </ul></body></html>"#,
            ))
            .mount(&server)
            .await;

        let lookup = provider(&server).list_episodes("/category/example-show").await;
        let found: Vec<(f64, &str)> = lookup
            .items
            .iter()
            .map(|e| (e.number, e.episode_id.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![(1.5, "/example-show-episode-1-5"), (5.0, "/example-show-episode-5")]
        );
    }

    #[tokio::test]
    async fn test_entry_points_direct_and_embed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/example-show-episode-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body>
                    <div class="play-video"><iframe src="https://embed.example/streaming.php?id=MTIz"></iframe></div>
                    <div class="anime_muti_link"><ul>
                        <li><a data-video="https://embed.example/streaming.php?id=MTIz">Vidstreaming</a></li>
                        <li><a data-video="https://mirror.example/e/xyz">Mirror</a></li>
                        <li><a data-video="https://files.example/ep1.mp4">File</a></li>
                    </ul></div>
                </body></html>"#,
            ))
            .mount(&server)
            .await;

        let lookup = provider(&server)
            .get_entry_points("/category/example-show", "/example-show-episode-1")
            .await;
        let kinds: Vec<(EntryKind, &str)> = lookup
            .items
            .iter()
            .map(|e| (e.kind, e.url.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (EntryKind::EmbedPage, "https://embed.example/streaming.php?id=MTIz"),
                (EntryKind::EmbedPage, "https://mirror.example/e/xyz"),
                (EntryKind::DirectMedia, "https://files.example/ep1.mp4"),
            ]
        );
    }

    #[tokio::test]
    async fn test_search_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.html"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let lookup = provider(&server).search("Example Show").await;
        assert!(lookup.is_empty());
        assert!(lookup.failure.is_some_and(|f| f.is_transport()));
    }
}

//! URL helper functions for provider and embed pages

use ::url::{Origin, Url};

/// Builds `{base}{path}?{key}={encoded query}`
///
/// # Example
/// ```
/// use anistream_core::url::build_query_url;
/// let url = build_query_url("https://provider.example/", "/search", "keyword", "one piece");
/// assert_eq!(url, "https://provider.example/search?keyword=one%20piece");
/// ```
pub fn build_query_url(base: &str, path: &str, key: &str, query: &str) -> String {
    format!(
        "{}{}?{}={}",
        base.trim_end_matches('/'),
        path,
        key,
        urlencoding::encode(query)
    )
}

/// Resolves a possibly relative link against the page it was found on
///
/// Protocol-relative links (`//host/path`) get the page's scheme.
///
/// # Example
/// ```
/// use anistream_core::url::absolutize;
/// assert_eq!(
///     absolutize("https://provider.example/search?q=x", "/anime/show"),
///     Some("https://provider.example/anime/show".to_string())
/// );
/// ```
pub fn absolutize(page_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let base = Url::parse(page_url).ok()?;
    base.join(href).ok().map(String::from)
}

/// Scheme, host and port of a URL, without trailing slash
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    match parsed.origin() {
        origin @ Origin::Tuple(..) => Some(origin.ascii_serialization()),
        Origin::Opaque(_) => None,
    }
}

/// Lowercased host of a URL
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|h| h.to_ascii_lowercase())
}

/// Value of a query parameter
pub fn query_param(url: &str, key: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Last non-empty path segment, used as an id for slug-style links
///
/// # Example
/// ```
/// use anistream_core::url::last_path_segment;
/// assert_eq!(last_path_segment("/category/example-show/"), Some("example-show".to_string()));
/// ```
pub fn last_path_segment(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .filter(|segment| !segment.contains(':'))
        .map(str::to_string)
}

//! Player page script parsers
//!
//! Embed hosts hide the real media URL inside inline script text. The
//! functions here scan that text for the handful of shapes players use.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::StreamSource;

const MEDIA_EXTENSIONS: &[&str] = &["m3u8", "mp4", "mkv", "webm", "mov", "flv", "m4v", "ts"];

static RESOLUTION_IN_TEXT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:^|[^0-9])(2160|1440|1080|720|480|360|240)(?:p|[^0-9]|$)").ok());

static VIDEOJS_PUSH: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#"videos\.push\(\{[^}]*src:\s*["']([^"']+)["'][^}]*res:\s*["']?(\d+)["']?[^}]*label:\s*["']([^"']+)["']"#,
    )
    .ok()
});

static JWPLAYER_SOURCE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"\{\s*["']?file["']?\s*:\s*["']([^"']+)["']([^}]*)\}"#).ok()
});

static LABEL_FIELD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"["']?label["']?\s*:\s*["']([^"']+)["']"#).ok());

static GENERIC_MEDIA_URL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"https?://[^"'\s<>\\]+\.(?:m3u8|mp4)(?:\?[^"'\s<>\\]*)?"#).ok()
});

/// Extracts the container hint from a URL path or its `filename=` parameter
pub fn container_from_url(url: &str) -> Option<String> {
    if let Some(filename) = filename_param(url)
        && let Some(ext) = known_extension(&filename)
    {
        return Some(ext);
    }

    let path = url.split(['?', '#']).next().unwrap_or(url);
    known_extension(path)
}

fn known_extension(path: &str) -> Option<String> {
    let last_segment = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = last_segment.rsplit_once('.')?;
    let ext = ext.to_lowercase();
    MEDIA_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

fn filename_param(url: &str) -> Option<String> {
    let query = url.split('?').nth(1)?;
    query.split('&').find_map(|param| {
        param
            .strip_prefix("filename=")
            .map(|value| urlencoding::decode(value).unwrap_or_default().into_owned())
    })
}

/// Finds a well-known vertical resolution in free text such as a URL
///
/// "ep1-1080p.mp4" → Some(1080), "4K" → Some(2160).
pub fn resolution_from_text(text: &str) -> Option<u32> {
    if let Some(re) = RESOLUTION_IN_TEXT.as_ref()
        && let Some(caps) = re.captures(text)
        && let Some(m) = caps.get(1)
        && let Ok(res) = m.as_str().parse::<u32>()
    {
        return Some(res);
    }
    if text.contains("4K") || text.contains("4k") {
        return Some(2160);
    }
    None
}

/// Decodes the HTML entities that commonly appear inside attribute URLs
pub fn decode_html_entities(url: &str) -> String {
    url.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("\\/", "/")
}

/// Scans VideoJS `videos.push({ src, res, label })` blocks
pub fn parse_videojs_sources(script: &str) -> Vec<StreamSource> {
    let Some(re) = VIDEOJS_PUSH.as_ref() else {
        return Vec::new();
    };

    re.captures_iter(script)
        .filter_map(|caps| {
            let url = decode_html_entities(caps.get(1)?.as_str());
            let res = caps.get(2).map(|m| m.as_str()).unwrap_or("0");
            let label = caps
                .get(3)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| format!("{}p", res));
            Some(StreamSource::new(url, label))
        })
        .collect()
}

/// Scans JWPlayer-style `{ file: "...", label: "..." }` source objects
///
/// Subtitle tracks (`.vtt`, `.srt`) and thumbnails are skipped.
pub fn parse_jwplayer_sources(script: &str) -> Vec<StreamSource> {
    let Some(re) = JWPLAYER_SOURCE.as_ref() else {
        return Vec::new();
    };

    re.captures_iter(script)
        .filter_map(|caps| {
            let url = decode_html_entities(caps.get(1)?.as_str());
            let container = container_from_url(&url)?;
            if !matches!(container.as_str(), "m3u8" | "mp4" | "mkv" | "webm" | "m4v") {
                return None;
            }
            let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let label = LABEL_FIELD
                .as_ref()
                .and_then(|re| re.captures(rest))
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| "default".to_string());
            Some(StreamSource::new(url, label))
        })
        .collect()
}

/// Finds the value assigned to one of `names` in script text
///
/// Matches `name = '...'`, `const name="..."` and `name: "..."`.
pub fn find_script_assignment(script: &str, names: &[&str]) -> Option<String> {
    for name in names {
        let pattern = format!(
            r#"(?:^|[^A-Za-z0-9_$]){}\s*[=:]\s*["']([^"']+)["']"#,
            regex::escape(name)
        );
        if let Ok(re) = Regex::new(&pattern)
            && let Some(caps) = re.captures(script)
            && let Some(m) = caps.get(1)
        {
            return Some(decode_html_entities(m.as_str()));
        }
    }
    None
}

/// Finds the first absolute `.m3u8` or `.mp4` URL anywhere in the text
pub fn find_media_url(text: &str) -> Option<String> {
    GENERIC_MEDIA_URL
        .as_ref()?
        .find(text)
        .map(|m| decode_html_entities(m.as_str()))
}

/// Label for a media URL whose quality is only implied by its path
pub fn label_from_url(url: &str, fallback: &str) -> String {
    match resolution_from_text(url) {
        Some(res) => format!("{}p", res),
        None => fallback.to_string(),
    }
}

//! Quality ranking of stream sources
//!
//! Pure functions, no I/O.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::StreamSource;

static TRAILING_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*[pP]?\s*$").ok());

/// Parses the trailing integer of a quality label
///
/// "1080p" → 1080, "720" → 720, "default" / "iframe/unresolved" → 0.
pub fn quality_rank(label: &str) -> u32 {
    let Some(re) = TRAILING_NUMBER.as_ref() else {
        return 0;
    };
    re.captures(label.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(0)
}

/// Stream-type preference among sources of equal numeric rank
fn type_preference(source: &StreamSource) -> u8 {
    if source.is_unresolved() {
        0
    } else if source.is_hls {
        2
    } else {
        1
    }
}

/// Sorts sources best-first
///
/// Primary key is the numeric rank parsed from the label, then HLS over
/// other playable sources over unresolved iframes. The sort is stable.
pub fn rank(mut sources: Vec<StreamSource>) -> Vec<StreamSource> {
    for source in &mut sources {
        source.quality_rank = quality_rank(&source.quality_label);
    }
    sources.sort_by(|a, b| {
        b.quality_rank
            .cmp(&a.quality_rank)
            .then_with(|| type_preference(b).cmp(&type_preference(a)))
    });
    sources
}

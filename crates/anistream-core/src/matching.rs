//! Title similarity scoring
//!
//! Guards against committing to the wrong show: a provider's candidate is
//! only used when its score clears the configured threshold.

use crate::types::SearchResult;

/// Default minimum confidence for a search candidate
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;

/// Lowercases and reduces a title to alphanumeric words
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

fn edit_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / longest as f64
}

fn token_overlap(a: &str, b: &str) -> f64 {
    let left: Vec<&str> = a.split(' ').filter(|t| !t.is_empty()).collect();
    let right: Vec<&str> = b.split(' ').filter(|t| !t.is_empty()).collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.iter().filter(|t| right.contains(t)).count();
    2.0 * shared as f64 / (left.len() + right.len()) as f64
}

/// Similarity of two titles in `0.0..=1.0`
///
/// The larger of normalised edit similarity and token overlap (Dice).
pub fn title_confidence(query: &str, candidate: &str) -> f64 {
    let query = normalize_title(query);
    let candidate = normalize_title(candidate);
    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    if query == candidate {
        return 1.0;
    }
    edit_similarity(&query, &candidate)
        .max(token_overlap(&query, &candidate))
        .clamp(0.0, 1.0)
}

/// Picks the best candidate a provider may use
///
/// Candidates from other providers are ignored. Among those at or above
/// `threshold` the highest confidence wins; ties keep the provider's order.
pub fn best_match<'a>(
    results: &'a [SearchResult],
    provider_id: &str,
    threshold: f64,
) -> Option<&'a SearchResult> {
    results
        .iter()
        .filter(|r| r.provider_id == provider_id && r.confidence >= threshold)
        .fold(None, |best: Option<&SearchResult>, r| match best {
            Some(b) if b.confidence >= r.confidence => Some(b),
            _ => Some(r),
        })
}

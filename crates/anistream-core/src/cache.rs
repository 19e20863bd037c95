//! Short-lived cache of successful resolutions
//!
//! Upstream stream URLs expire, so entries live for minutes at most. Only
//! successes are stored; a miss behaves exactly like a disabled cache.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::types::ResolutionResult;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// `(title, episode, preferred provider)` with the title normalised
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    title: String,
    episode_bits: u64,
    provider: Option<String>,
}

impl CacheKey {
    pub fn new(title: &str, episode: f64, provider: Option<&str>) -> Self {
        // -0.0 and 0.0 are the same episode
        let episode = if episode == 0.0 { 0.0 } else { episode };
        Self {
            title: title
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
            episode_bits: episode.to_bits(),
            provider: provider.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    result: ResolutionResult,
    inserted: Instant,
}

/// Bounded TTL map shared by concurrent resolutions
#[derive(Debug)]
pub struct ResolutionCache {
    ttl: Duration,
    capacity: usize,
    entries: RwLock<HashMap<CacheKey, Entry>>,
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL, DEFAULT_CACHE_CAPACITY)
    }
}

impl ResolutionCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cache that never stores anything
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, 0)
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero() && self.capacity > 0
    }

    /// Fresh entry for `key`, if any
    pub async fn get(&self, key: &CacheKey) -> Option<ResolutionResult> {
        if !self.is_enabled() {
            return None;
        }
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| e.inserted.elapsed() < self.ttl)
            .map(|e| e.result.clone())
    }

    /// Stores a successful result, evicting expired and then oldest entries
    pub async fn insert(&self, key: CacheKey, result: ResolutionResult) {
        if !self.is_enabled() {
            return;
        }
        let mut entries = self.entries.write().await;
        let ttl = self.ttl;
        entries.retain(|_, e| e.inserted.elapsed() < ttl);

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                tracing::debug!(?oldest, "cache full, evicting oldest entry");
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            Entry {
                result,
                inserted: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StreamSource;
    use chrono::Utc;

    fn result(provider: &str) -> ResolutionResult {
        ResolutionResult {
            sources: vec![StreamSource::new("https://cdn/ex.mp4", "direct")],
            provider_used: provider.to_string(),
            resolved_at: Utc::now(),
        }
    }

    #[test]
    fn test_key_normalises_title() {
        assert_eq!(
            CacheKey::new("  Example   Show ", 1.0, None),
            CacheKey::new("example show", 1.0, None)
        );
        assert_ne!(
            CacheKey::new("Example Show", 1.0, None),
            CacheKey::new("Example Show", 1.0, Some("gogo"))
        );
        assert_ne!(
            CacheKey::new("Example Show", 1.0, None),
            CacheKey::new("Example Show", 1.5, None)
        );
        assert_eq!(CacheKey::new("x", -0.0, None), CacheKey::new("x", 0.0, None));
    }

    #[tokio::test]
    async fn test_get_after_insert() {
        let cache = ResolutionCache::default();
        let key = CacheKey::new("Example Show", 1.0, None);
        assert!(cache.get(&key).await.is_none());

        cache.insert(key.clone(), result("pahe")).await;
        let hit = cache.get(&key).await.unwrap();
        assert_eq!(hit.provider_used, "pahe");
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = ResolutionCache::new(Duration::from_millis(30), 8);
        let key = CacheKey::new("Example Show", 1.0, None);
        cache.insert(key.clone(), result("pahe")).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let cache = ResolutionCache::new(Duration::from_secs(60), 2);
        cache.insert(CacheKey::new("a", 1.0, None), result("a")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.insert(CacheKey::new("b", 1.0, None), result("b")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.insert(CacheKey::new("c", 1.0, None), result("c")).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get(&CacheKey::new("a", 1.0, None)).await.is_none());
        assert!(cache.get(&CacheKey::new("c", 1.0, None)).await.is_some());
    }

    #[tokio::test]
    async fn test_disabled_cache_stores_nothing() {
        let cache = ResolutionCache::disabled();
        let key = CacheKey::new("Example Show", 1.0, None);
        cache.insert(key.clone(), result("pahe")).await;
        assert!(cache.get(&key).await.is_none());
        assert!(cache.is_empty().await);
    }
}

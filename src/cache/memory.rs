//! In-memory cache implementation using moka
//!
//! Values are stored as JSON strings so any serializable type fits, and each
//! entry carries its own TTL, enforced through a moka expiry policy.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default maximum cache capacity (number of entries)
const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Default TTL for cache entries
const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Clone)]
struct CacheEntry {
    data: Arc<String>,
    ttl: Duration,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T, ttl: Duration) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            data: Arc::new(json),
            ttl,
        })
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).context("Failed to deserialize cache value")
    }
}

/// Expire each entry after the TTL it was inserted with
struct PerEntryTtl;

impl Expiry<String, CacheEntry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &CacheEntry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory cache using moka
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    default_ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl MemoryCache {
    /// Create a memory cache with 10,000 entries and a five minute TTL
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_CAPACITY, DEFAULT_TTL)
    }

    /// Create a memory cache with custom capacity and default TTL
    pub fn with_capacity_and_ttl(max_capacity: u64, default_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self { cache, default_ttl }
    }

    /// TTL callers should use when they have no better value
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get the current number of entries in the cache
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Glob match supporting `*` (any run) and `?` (one character)
    ///
    /// `entity:*` matches `entity:ads:12`; `entity:?ds:*` matches it too.
    fn pattern_matches(pattern: &str, key: &str) -> bool {
        let pattern: Vec<char> = pattern.chars().collect();
        let key: Vec<char> = key.chars().collect();

        let (mut p, mut k) = (0, 0);
        let mut backtrack: Option<(usize, usize)> = None;

        while k < key.len() {
            match pattern.get(p) {
                Some('*') => {
                    backtrack = Some((p, k));
                    p += 1;
                }
                Some(&c) if c == '?' || c == key[k] => {
                    p += 1;
                    k += 1;
                }
                _ => match backtrack {
                    // Let the last star swallow one more character
                    Some((star, matched)) => {
                        p = star + 1;
                        k = matched + 1;
                        backtrack = Some((star, matched + 1));
                    }
                    None => return false,
                },
            }
        }

        pattern[p..].iter().all(|c| *c == '*')
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) => Ok(Some(entry.deserialize()?)),
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(value, ttl)?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        // Walks every key; the cache is bounded so this stays cheap
        let keys_to_delete: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| Self::pattern_matches(pattern, key.as_ref()))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in keys_to_delete {
            self.cache.invalidate(&key).await;
        }

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Region {
        id: i64,
        name: String,
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new();
        cache.set("key1", &"value1".to_string(), Duration::from_secs(60)).await.unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(result, Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let cache = MemoryCache::new();
        let result: Option<String> = cache.get("missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_struct_values() {
        let cache = MemoryCache::new();
        let region = Region { id: 7, name: "Maule".into() };
        cache.set("entity:regions:7", &region, Duration::from_secs(60)).await.unwrap();

        let cached: Option<Region> = cache.get("entity:regions:7").await.unwrap();
        assert_eq!(cached, Some(region));
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = MemoryCache::new();
        cache.set("k", &1u32, Duration::from_secs(60)).await.unwrap();
        cache.delete("k").await.unwrap();
        assert!(cache.get::<u32>("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("entity:ads:1", &1u32, ttl).await.unwrap();
        cache.set("entity:regions:2", &2u32, ttl).await.unwrap();
        cache.set("other:1", &3u32, ttl).await.unwrap();

        cache.delete_pattern("entity:*").await.unwrap();

        assert!(cache.get::<u32>("entity:ads:1").await.unwrap().is_none());
        assert!(cache.get::<u32>("entity:regions:2").await.unwrap().is_none());
        assert_eq!(cache.get::<u32>("other:1").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = MemoryCache::new();
        cache.set("a", &1u32, Duration::from_secs(60)).await.unwrap();
        cache.clear().await.unwrap();
        assert!(cache.get::<u32>("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_per_entry_ttl() {
        let cache = MemoryCache::new();
        cache.set("short", &1u32, Duration::from_millis(20)).await.unwrap();
        cache.set("long", &2u32, Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        cache.cache.run_pending_tasks().await;

        assert!(cache.get::<u32>("short").await.unwrap().is_none());
        assert_eq!(cache.get::<u32>("long").await.unwrap(), Some(2));
    }

    #[test]
    fn test_pattern_matching() {
        assert!(MemoryCache::pattern_matches("entity:*", "entity:ads:1"));
        assert!(MemoryCache::pattern_matches("entity:*", "entity:"));
        assert!(MemoryCache::pattern_matches("*:1", "entity:ads:1"));
        assert!(MemoryCache::pattern_matches("entity:?ds:*", "entity:ads:12"));
        assert!(MemoryCache::pattern_matches("a*b*c", "axxbyyc"));
        assert!(!MemoryCache::pattern_matches("entity:*", "other:1"));
        assert!(!MemoryCache::pattern_matches("a?c", "ac"));
        assert!(!MemoryCache::pattern_matches("abc", "abcd"));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(20))]

            /// Writing a key then reading it returns the same value.
            #[test]
            fn prop_cache_hit_after_set(
                key in "[a-z]{1,10}",
                value in "[a-z]{1,100}"
            ) {
                let rt = tokio::runtime::Runtime::new().unwrap();
                rt.block_on(async {
                    let cache = MemoryCache::new();
                    prop_assert_eq!(cache.get::<String>(&key).await.unwrap(), None);

                    cache.set(&key, &value, Duration::from_secs(60)).await.unwrap();
                    prop_assert_eq!(cache.get::<String>(&key).await.unwrap(), Some(value.clone()));
                    Ok(())
                })?;
            }

            /// A prefix star pattern matches every key carrying that prefix.
            #[test]
            fn prop_prefix_pattern_matches(prefix in "[a-z:]{0,8}", rest in "[a-z0-9:]{0,12}") {
                let pattern = format!("{}*", prefix);
                let key = format!("{}{}", prefix, rest);
                prop_assert!(MemoryCache::pattern_matches(&pattern, &key));
            }
        }
    }
}

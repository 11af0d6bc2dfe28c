//! Bounded memo of recent verdicts.

use quick_cache::sync::Cache;
use serde::Serialize;

/// Memoizes the rule-stage verdict per (URL, page) pair.
///
/// Entries carry the generation of the database that produced them; a hit
/// from an older generation is treated as a miss. The whole cache is also
/// cleared on publish, so the generation check only covers the window
/// between the swap and the clear.
pub struct MatchCache {
    cache: Cache<String, (u64, bool)>,
    capacity: usize,
}

impl MatchCache {
    /// `None` when `capacity` is zero (caching disabled).
    pub fn new(capacity: usize) -> Option<Self> {
        if capacity == 0 {
            return None;
        }
        Some(Self {
            cache: Cache::new(capacity),
            capacity,
        })
    }

    /// Cache key for a request.
    pub fn key(url: &str, page_url: Option<&str>) -> String {
        let page = page_url.unwrap_or("");
        let mut key = String::with_capacity(url.len() + page.len() + 1);
        key.push_str(url);
        key.push('\n');
        key.push_str(page);
        key
    }

    /// Cached verdict, if one exists for `generation`.
    pub fn get(&self, key: &str, generation: u64) -> Option<bool> {
        match self.cache.get(key) {
            Some((gen, blocked)) if gen == generation => Some(blocked),
            _ => None,
        }
    }

    pub fn insert(&self, key: String, generation: u64, blocked: bool) {
        self.cache.insert(key, (generation, blocked));
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            capacity: self.capacity,
            len: self.len(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub capacity: usize,
    pub len: usize,
}

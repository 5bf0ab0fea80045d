//! Short-lived memoization of analysis results.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};

use crate::analytics::{AnalysisResult, CompareMode, CostBasis};

/// Everything that can change a result for the same row scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub scope: String,
    pub filters: String,
    pub period: String,
    pub compare_to: CompareMode,
    pub cost_basis: CostBasis,
    pub now: NaiveDate,
    /// Remaining request knobs (target, horizon, completeness), pre-rendered.
    pub extras: String,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}:{}",
            self.scope, self.filters, self.period, self.compare_to, self.cost_basis, self.now, self.extras
        )
    }
}

#[derive(Debug, Clone)]
struct CachedResult {
    result: AnalysisResult,
    cached_at: DateTime<Utc>,
}

/// In-memory result cache with TTL. Share it between engines behind an `Arc`.
pub struct ResultCache {
    entries: Mutex<HashMap<CacheKey, CachedResult>>,
    ttl_seconds: u64,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::with_ttl(60)
    }

    pub fn with_ttl(ttl_seconds: u64) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl_seconds }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    fn is_fresh(&self, cached: &CachedResult, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(cached.cached_at);
        age.num_seconds() < i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX)
    }

    /// Returns the cached result if present and not expired.
    pub fn get(&self, key: &CacheKey) -> Option<AnalysisResult> {
        let cache = self.entries.lock().ok()?;
        let cached = cache.get(key)?;
        self.is_fresh(cached, Utc::now()).then(|| cached.result.clone())
    }

    /// Stores a result, dropping expired entries first.
    pub fn insert(&self, key: CacheKey, result: AnalysisResult) {
        if let Ok(mut cache) = self.entries.lock() {
            let now = Utc::now();
            cache.retain(|_, cached| self.is_fresh(cached, now));
            cache.insert(key, CachedResult { result, cached_at: now });
        }
    }

    pub fn invalidate(&self, key: &CacheKey) {
        if let Ok(mut cache) = self.entries.lock() {
            cache.remove(key);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.entries.lock() {
            cache.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

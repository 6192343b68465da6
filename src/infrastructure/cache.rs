//! Session response cache
//!
//! Per-source memo tables keyed by `(ecosystem, name, version)` plus a
//! separate memo for latest-version lookups. Negative results are stored
//! explicitly so a failed or empty lookup is never requeried within the same
//! session. There is no eviction policy; the tables live as long as the
//! resolver instance that owns them, and each resolver gets its own tables so
//! concurrent runs (e.g. in tests) cannot corrupt one another's state.

use moka::future::Cache;

use crate::domain::package::{Dependency, Ecosystem};

/// Which memo table a lookup belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Aggregator,
    Registry,
    Fallback,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Aggregator => "aggregator",
            SourceKind::Registry => "registry",
            SourceKind::Fallback => "fallback",
        }
    }
}

/// A memoized lookup result: `None` is the explicit negative marker.
pub type CachedDeps = Option<Vec<Dependency>>;

/// Memo tables for one resolver instance.
pub struct ResponseCache {
    aggregator: Cache<String, CachedDeps>,
    registry: Cache<String, CachedDeps>,
    fallback: Cache<String, CachedDeps>,
    latest_versions: Cache<String, Option<String>>,
}

// Session caches are bounded only to keep pathological runs from growing
// without limit; entries are never evicted in practice.
const TABLE_CAPACITY: u64 = 100_000;

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            aggregator: Cache::new(TABLE_CAPACITY),
            registry: Cache::new(TABLE_CAPACITY),
            fallback: Cache::new(TABLE_CAPACITY),
            latest_versions: Cache::new(TABLE_CAPACITY),
        }
    }

    fn table(&self, source: SourceKind) -> &Cache<String, CachedDeps> {
        match source {
            SourceKind::Aggregator => &self.aggregator,
            SourceKind::Registry => &self.registry,
            SourceKind::Fallback => &self.fallback,
        }
    }

    fn deps_key(ecosystem: Ecosystem, name: &str, version: &str) -> String {
        format!("{}:{}:{}", ecosystem.canonical_name(), name, version)
    }

    fn latest_key(ecosystem: Ecosystem, name: &str) -> String {
        format!("{}:{}", ecosystem.canonical_name(), name)
    }

    /// Outer `None` is a cache miss; `Some(None)` is a memoized negative.
    pub async fn get_deps(
        &self,
        source: SourceKind,
        ecosystem: Ecosystem,
        name: &str,
        version: &str,
    ) -> Option<CachedDeps> {
        self.table(source)
            .get(&Self::deps_key(ecosystem, name, version))
            .await
    }

    pub async fn put_deps(
        &self,
        source: SourceKind,
        ecosystem: Ecosystem,
        name: &str,
        version: &str,
        result: CachedDeps,
    ) {
        self.table(source)
            .insert(Self::deps_key(ecosystem, name, version), result)
            .await;
    }

    pub async fn get_latest(&self, ecosystem: Ecosystem, name: &str) -> Option<Option<String>> {
        self.latest_versions
            .get(&Self::latest_key(ecosystem, name))
            .await
    }

    pub async fn put_latest(&self, ecosystem: Ecosystem, name: &str, version: Option<String>) {
        self.latest_versions
            .insert(Self::latest_key(ecosystem, name), version)
            .await;
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

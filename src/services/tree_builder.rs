//! Dependency tree construction
//!
//! The builder walks the declared direct dependencies one at a time and
//! expands each depth-first over an explicit work stack (no native recursion,
//! so pathological dependency chains cannot exhaust the call stack). For
//! every package it consults the aggregator, the native registry, and the
//! fallback source in that order until one yields a non-empty dependency
//! list; a package for which all three come up empty is a leaf. Every source
//! failure is logged and swallowed at the call site, so a run always
//! completes and returns a (possibly partial) tree even under total network
//! failure.
//!
//! Execution is a single logical flow: direct dependencies are processed
//! strictly in order and a package's discovered dependencies are fully
//! expanded before the next sibling begins. This lets one shared pacer
//! enforce global request spacing, and lets the tree and resolved set be
//! mutated without locking.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::application::events::{ProgressSink, ResolutionPhase, ResolutionProgress};
use crate::config::ResolverConfig;
use crate::domain::package::{Dependency, Ecosystem, PackageKey, PackageRef};
use crate::domain::tree::DependencyTree;
use crate::infrastructure::cache::{ResponseCache, SourceKind};
use crate::infrastructure::pacing::RequestPacer;
use crate::infrastructure::registries::{
    CratesIoRegistry, NpmRegistry, PyPiRegistry, RegistryGateway, RubyGemsRegistry,
};
use crate::infrastructure::sources::{
    AggregatorSource, DependencySource, FallbackSource, SourceError,
};

/// Lookup for metadata about a declared direct dependency.
pub trait PackageCatalog: Send + Sync {
    fn lookup(&self, key: &str) -> Option<PackageRef>;
}

/// Catalog backed by a prebuilt map, for callers that already resolved their
/// direct dependencies.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    entries: HashMap<String, PackageRef>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, package: PackageRef) {
        self.entries.insert(key.into(), package);
    }
}

impl PackageCatalog for InMemoryCatalog {
    fn lookup(&self, key: &str) -> Option<PackageRef> {
        self.entries.get(key).cloned()
    }
}

impl FromIterator<PackageRef> for InMemoryCatalog {
    /// Keys each package by its own `name@version` identity.
    fn from_iter<I: IntoIterator<Item = PackageRef>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for package in iter {
            catalog.insert(package.key().as_str().to_string(), package);
        }
        catalog
    }
}

/// One pending node: a package discovered at `depth`, still to be recorded
/// and expanded. Direct dependencies enter at depth 0 with no parent and are
/// never stored as nodes.
struct WorkItem {
    name: String,
    version: String,
    depth: u32,
    parent: Option<PackageKey>,
}

/// Orchestrates recursive dependency resolution and owns the per-session
/// memo tables and the global request pacer.
pub struct TreeBuilder {
    config: ResolverConfig,
    aggregator: Arc<dyn DependencySource>,
    registries: RegistryGateway,
    fallback: Arc<dyn DependencySource>,
    pacer: RequestPacer,
    cache: Arc<ResponseCache>,
}

impl TreeBuilder {
    /// Assemble a builder from explicit collaborators. Tests inject mock-
    /// backed sources here.
    pub fn new(
        config: ResolverConfig,
        aggregator: Arc<dyn DependencySource>,
        registries: RegistryGateway,
        fallback: Arc<dyn DependencySource>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        let pacer = RequestPacer::new(config.min_request_spacing());
        Self {
            config,
            aggregator,
            registries,
            fallback,
            pacer,
            cache,
        }
    }

    /// Assemble a builder wired to the production endpoints.
    pub fn from_config(config: ResolverConfig) -> Self {
        let timeout = config.request_timeout();
        let cache = Arc::new(ResponseCache::new());
        let registries = RegistryGateway::new()
            .register(Box::new(NpmRegistry::new(timeout)))
            .register(Box::new(PyPiRegistry::new(timeout)))
            .register(Box::new(
                CratesIoRegistry::new(timeout).with_cache(cache.clone()),
            ))
            .register(Box::new(RubyGemsRegistry::new(timeout)));
        Self::new(
            config,
            Arc::new(AggregatorSource::new(timeout)),
            registries,
            Arc::new(FallbackSource::new(timeout)),
            cache,
        )
    }

    /// Resolve the full transitive dependency tree for a set of direct
    /// dependencies.
    ///
    /// Each direct dependency is looked up in `catalog` and expanded in
    /// order. Direct dependencies themselves are not stored as tree nodes;
    /// only the packages discovered while expanding them are. The returned
    /// tree is complete up to `max_depth` and per-key revisit suppression,
    /// and is always returned even when every source call failed.
    pub async fn resolve_dependency_tree(
        &self,
        direct_dependencies: &[String],
        catalog: &dyn PackageCatalog,
        ecosystem: Ecosystem,
        progress: &dyn ProgressSink,
    ) -> DependencyTree {
        // Explicit initialization of sources that need it (the fallback's
        // platform directory) before any resolution begins.
        if let Err(e) = self.aggregator.prepare().await {
            warn!(error = %e, "aggregator source initialization failed");
        }
        if let Err(e) = self.fallback.prepare().await {
            warn!(error = %e, "fallback source initialization failed");
        }

        let mut tree = DependencyTree::new();
        let mut resolved: HashSet<PackageKey> = HashSet::new();
        let total = self.estimated_total(direct_dependencies.len());
        let mut processed = 0usize;

        for key in direct_dependencies {
            let Some(package) = catalog.lookup(key) else {
                warn!(key, "direct dependency missing from catalog; skipping");
                continue;
            };
            self.expand(
                &package,
                ecosystem,
                &mut tree,
                &mut resolved,
                progress,
                &mut processed,
                total,
            )
            .await;
        }

        progress
            .report(ResolutionProgress {
                phase: ResolutionPhase::Completed,
                message: format!("resolved {} packages", tree.len()),
                package_name: String::new(),
                processed,
                total,
                percent: 100,
            })
            .await;

        tree
    }

    /// Depth-first expansion of one direct dependency over an explicit work
    /// stack. Children are pushed in reverse so they are expanded in
    /// discovery order, and each package is recorded only when its own work
    /// item is popped. A package shared between two siblings is therefore
    /// first recorded inside the earlier sibling's fully-expanded subtree, at
    /// that subtree's depth; the later sibling's arrival only adds a parent
    /// edge.
    async fn expand(
        &self,
        root: &PackageRef,
        ecosystem: Ecosystem,
        tree: &mut DependencyTree,
        resolved: &mut HashSet<PackageKey>,
        progress: &dyn ProgressSink,
        processed: &mut usize,
        total: usize,
    ) {
        let mut work = vec![WorkItem {
            name: root.name.clone(),
            version: root.version.clone(),
            depth: 0,
            parent: None,
        }];

        while let Some(item) = work.pop() {
            let key = PackageKey::new(&item.name, &item.version);

            // Record before any expansion gating, so a revisit still gains a
            // parent edge while keeping its first-discovery depth.
            if let Some(parent) = &item.parent {
                tree.record_dependency(parent, &item.name, &item.version, item.depth);
            }

            // At the depth bound the package stays in the tree (someone
            // discovered it) but its own dependencies are never queried.
            if item.depth >= self.config.max_depth {
                continue;
            }

            if !resolved.insert(key.clone()) {
                // Already expanded; links were updated above.
                continue;
            }

            *processed += 1;
            progress
                .report(ResolutionProgress {
                    phase: ResolutionPhase::Resolving,
                    message: format!("resolving {}", key),
                    package_name: item.name.clone(),
                    processed: *processed,
                    total,
                    percent: (*processed * 100 / total).min(100) as u8,
                })
                .await;

            let deps = self
                .collect_direct_dependencies(ecosystem, &item.name, &item.version)
                .await;
            if deps.is_empty() {
                // Leaf: every source came up empty. Not an error.
                continue;
            }

            let mut children = Vec::with_capacity(deps.len());
            for dep in deps {
                children.push(WorkItem {
                    name: dep.name,
                    version: dep.version,
                    depth: item.depth + 1,
                    parent: Some(key.clone()),
                });
            }
            for child in children.into_iter().rev() {
                work.push(child);
            }
        }
    }

    /// Try each source in order until one yields a non-empty list. Timeouts,
    /// transport errors and empty answers all advance to the next source.
    async fn collect_direct_dependencies(
        &self,
        ecosystem: Ecosystem,
        name: &str,
        version: &str,
    ) -> Vec<Dependency> {
        if let Some(deps) = self.try_aggregator(ecosystem, name, version).await {
            return deps;
        }
        if let Some(deps) = self.try_registry(ecosystem, name, version).await {
            return deps;
        }
        if let Some(deps) = self.try_fallback(ecosystem, name, version).await {
            return deps;
        }
        Vec::new()
    }

    async fn try_aggregator(
        &self,
        ecosystem: Ecosystem,
        name: &str,
        version: &str,
    ) -> Option<Vec<Dependency>> {
        if let Some(cached) = self
            .cache
            .get_deps(SourceKind::Aggregator, ecosystem, name, version)
            .await
        {
            return cached;
        }
        if self.aggregator.handles(ecosystem) {
            self.pacer.acquire().await;
        }
        let outcome = self
            .aggregator
            .fetch_direct_dependencies(ecosystem, name, version)
            .await;
        let deps = classify(SourceKind::Aggregator, ecosystem, name, version, outcome);
        self.cache
            .put_deps(SourceKind::Aggregator, ecosystem, name, version, deps.clone())
            .await;
        deps
    }

    async fn try_registry(
        &self,
        ecosystem: Ecosystem,
        name: &str,
        version: &str,
    ) -> Option<Vec<Dependency>> {
        if let Some(cached) = self
            .cache
            .get_deps(SourceKind::Registry, ecosystem, name, version)
            .await
        {
            return cached;
        }
        if self.registries.will_request(ecosystem).await {
            self.pacer.acquire().await;
        }
        let outcome = self.registries.fetch(ecosystem, name, version).await;
        let deps = classify(SourceKind::Registry, ecosystem, name, version, outcome);
        self.cache
            .put_deps(SourceKind::Registry, ecosystem, name, version, deps.clone())
            .await;
        deps
    }

    async fn try_fallback(
        &self,
        ecosystem: Ecosystem,
        name: &str,
        version: &str,
    ) -> Option<Vec<Dependency>> {
        if let Some(cached) = self
            .cache
            .get_deps(SourceKind::Fallback, ecosystem, name, version)
            .await
        {
            return cached;
        }
        if self.fallback.handles(ecosystem) {
            self.pacer.acquire().await;
        }
        let outcome = self
            .fallback
            .fetch_direct_dependencies(ecosystem, name, version)
            .await;
        let deps = classify(SourceKind::Fallback, ecosystem, name, version, outcome);
        self.cache
            .put_deps(SourceKind::Fallback, ecosystem, name, version, deps.clone())
            .await;
        deps
    }

    /// Heuristic package count for progress percentages: direct-dependency
    /// count times an assumed fan-out, capped. Callers treat it as
    /// approximate.
    fn estimated_total(&self, direct_count: usize) -> usize {
        // The cap is a public knob; floor it so clamp stays well-formed.
        let cap = self.config.progress_total_cap.max(1);
        (direct_count * self.config.fan_out_estimate).clamp(1, cap)
    }
}

/// Convert one source call's outcome into "dependencies or nothing". Every
/// error becomes a logged negative; only non-empty lists count as an answer.
fn classify(
    source: SourceKind,
    ecosystem: Ecosystem,
    name: &str,
    version: &str,
    outcome: Result<Option<Vec<Dependency>>, SourceError>,
) -> Option<Vec<Dependency>> {
    match outcome {
        Ok(Some(deps)) if !deps.is_empty() => Some(deps),
        Ok(_) => None,
        Err(SourceError::NotFound) | Err(SourceError::UnsupportedEcosystem(_)) => {
            debug!(
                source = source.as_str(),
                %ecosystem,
                package = name,
                version,
                "source has no answer"
            );
            None
        }
        Err(e) => {
            warn!(
                source = source.as_str(),
                %ecosystem,
                package = name,
                version,
                error = %e,
                "source lookup failed; continuing"
            );
            None
        }
    }
}

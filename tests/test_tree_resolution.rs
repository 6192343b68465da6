//! End-to-end resolution tests against mock metadata sources

mod common;

use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use deptree::application::events::{NoOpSink, ResolutionPhase, VecSink};
use deptree::services::tree_builder::InMemoryCatalog;
use deptree::{Ecosystem, PackageKey, PackageRef, ResolverConfig};

use common::{
    harness, harness_with_unreachable_registry, mount_aggregator_deps, mount_npm_packument,
    requests_for_path, test_config,
};

fn catalog_of(packages: &[(&str, &str)]) -> (Vec<String>, InMemoryCatalog) {
    let catalog: InMemoryCatalog = packages
        .iter()
        .map(|(name, version)| PackageRef::new(*name, *version))
        .collect();
    let keys = packages
        .iter()
        .map(|(name, version)| format!("{}@{}", name, version))
        .collect();
    (keys, catalog)
}

#[tokio::test]
async fn test_registry_used_when_aggregator_empty() {
    let h = harness(test_config()).await;
    mount_npm_packument(&h.registry, "a", "1.0.0", &[("b", "^1.0.0")]).await;

    let (keys, catalog) = catalog_of(&[("a", "1.0.0")]);
    let tree = h
        .builder
        .resolve_dependency_tree(&keys, &catalog, Ecosystem::Npm, &NoOpSink)
        .await;

    let b = tree.get(&PackageKey::new("b", "1.0.0")).expect("b resolved");
    assert_eq!(b.depth, 1);

    // The aggregator was consulted first and the fallback never needed for a.
    assert_eq!(
        requests_for_path(
            &h.aggregator,
            "/v3/systems/NPM/packages/a/versions/1.0.0:dependencies"
        )
        .await,
        1
    );
    assert_eq!(requests_for_path(&h.fallback, "/api/NPM/a").await, 0);
}

#[tokio::test]
async fn test_aggregator_preferred_over_registry() {
    let h = harness(test_config()).await;
    mount_aggregator_deps(&h.aggregator, "NPM", "a", "1.0.0", &[("b", "2.0.0")]).await;
    // The registry knows a different answer; it must not be consulted.
    mount_npm_packument(&h.registry, "a", "1.0.0", &[("wrong", "^9.0.0")]).await;

    let (keys, catalog) = catalog_of(&[("a", "1.0.0")]);
    let tree = h
        .builder
        .resolve_dependency_tree(&keys, &catalog, Ecosystem::Npm, &NoOpSink)
        .await;

    assert!(tree.get(&PackageKey::new("b", "2.0.0")).is_some());
    assert!(tree.get(&PackageKey::new("wrong", "9.0.0")).is_none());
    assert_eq!(requests_for_path(&h.registry, "/a").await, 0);
}

#[tokio::test]
async fn test_fallback_used_when_aggregator_and_registry_empty() {
    let h = harness(test_config()).await;
    Mock::given(method("GET"))
        .and(path("/api/NPM/a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "versions": [{
                "number": "1.0.0",
                "dependencies": [
                    { "packageName": "b", "requirements": ">= 2.0", "kind": "runtime" },
                    { "packageName": "dev-only", "requirements": "*", "kind": "Development" }
                ]
            }],
            "latestReleaseNumber": "1.0.0"
        })))
        .mount(&h.fallback)
        .await;

    let (keys, catalog) = catalog_of(&[("a", "1.0.0")]);
    let tree = h
        .builder
        .resolve_dependency_tree(&keys, &catalog, Ecosystem::Npm, &NoOpSink)
        .await;

    let b = tree.get(&PackageKey::new("b", "2.0")).expect("b via fallback");
    assert_eq!(b.depth, 1);
    assert!(
        tree.nodes.values().all(|n| n.name != "dev-only"),
        "non-runtime kinds are excluded"
    );
}

#[tokio::test]
async fn test_aggregator_indirect_edges_ignored() {
    let h = harness(test_config()).await;
    let nodes = serde_json::json!({
        "nodes": [
            { "relation": "SELF",     "versionKey": { "name": "a", "version": "1.0.0" } },
            { "relation": "DIRECT",   "versionKey": { "name": "b", "version": "1.0.0" } },
            { "relation": "INDIRECT", "versionKey": { "name": "deep", "version": "1.0.0" } }
        ]
    });
    Mock::given(method("GET"))
        .and(path("/v3/systems/NPM/packages/a/versions/1.0.0:dependencies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(nodes))
        .mount(&h.aggregator)
        .await;

    let (keys, catalog) = catalog_of(&[("a", "1.0.0")]);
    let tree = h
        .builder
        .resolve_dependency_tree(&keys, &catalog, Ecosystem::Npm, &NoOpSink)
        .await;

    assert!(tree.get(&PackageKey::new("b", "1.0.0")).is_some());
    assert!(
        tree.get(&PackageKey::new("deep", "1.0.0")).is_none(),
        "transitive edges are rediscovered by recursion, not consumed"
    );
}

#[tokio::test]
async fn test_depth_contract() {
    let config = ResolverConfig {
        max_depth: 2,
        ..test_config()
    };
    let h = harness(config).await;
    mount_npm_packument(&h.registry, "a", "1.0.0", &[("b", "1.0.0")]).await;
    mount_npm_packument(&h.registry, "b", "1.0.0", &[("c", "1.0.0")]).await;
    mount_npm_packument(&h.registry, "c", "1.0.0", &[("d", "1.0.0")]).await;

    let (keys, catalog) = catalog_of(&[("a", "1.0.0")]);
    let tree = h
        .builder
        .resolve_dependency_tree(&keys, &catalog, Ecosystem::Npm, &NoOpSink)
        .await;

    assert_eq!(tree.get(&PackageKey::new("b", "1.0.0")).unwrap().depth, 1);
    assert_eq!(tree.get(&PackageKey::new("c", "1.0.0")).unwrap().depth, 2);
    assert!(
        tree.get(&PackageKey::new("d", "1.0.0")).is_none(),
        "c's children are never fetched beyond max_depth"
    );
    assert_eq!(
        requests_for_path(&h.registry, "/c").await,
        0,
        "expansion of c is rejected before any network call"
    );
}

#[tokio::test]
async fn test_shared_sibling_first_discovered_in_earlier_subtree() {
    let h = harness(test_config()).await;
    // p declares both a and b; a also depends on b. Depth-first order fully
    // expands a's subtree before b is visited as p's own child, so b is
    // first discovered inside a at depth 2.
    mount_npm_packument(&h.registry, "p", "1.0.0", &[("a", "1.0.0"), ("b", "1.0.0")]).await;
    mount_npm_packument(&h.registry, "a", "1.0.0", &[("b", "1.0.0")]).await;

    let (keys, catalog) = catalog_of(&[("p", "1.0.0")]);
    let tree = h
        .builder
        .resolve_dependency_tree(&keys, &catalog, Ecosystem::Npm, &NoOpSink)
        .await;

    let b = tree.get(&PackageKey::new("b", "1.0.0")).unwrap();
    assert_eq!(b.depth, 2, "first-discovery depth comes from a's subtree");
    assert_eq!(b.parents.len(), 2);
    assert!(b.parents.contains(&PackageKey::new("a", "1.0.0")));
    assert!(b.parents.contains(&PackageKey::new("p", "1.0.0")));
    assert_eq!(requests_for_path(&h.registry, "/b").await, 1);
}

#[tokio::test]
async fn test_diamond_dependency_fetched_once() {
    let h = harness(test_config()).await;
    mount_npm_packument(&h.registry, "a", "1.0.0", &[("b", "1.0.0"), ("c", "1.0.0")]).await;
    mount_npm_packument(&h.registry, "b", "1.0.0", &[("d", "1.0.0")]).await;
    mount_npm_packument(&h.registry, "c", "1.0.0", &[("d", "1.0.0")]).await;
    mount_npm_packument(&h.registry, "d", "1.0.0", &[]).await;

    let (keys, catalog) = catalog_of(&[("a", "1.0.0")]);
    let tree = h
        .builder
        .resolve_dependency_tree(&keys, &catalog, Ecosystem::Npm, &NoOpSink)
        .await;

    let d = tree.get(&PackageKey::new("d", "1.0.0")).unwrap();
    assert_eq!(d.parents.len(), 2);
    assert!(d.parents.contains(&PackageKey::new("b", "1.0.0")));
    assert!(d.parents.contains(&PackageKey::new("c", "1.0.0")));
    assert_eq!(d.depth, 2, "first-discovery depth");

    let stats = tree.stats();
    assert_eq!(stats.packages_with_multiple_parents, 1);
    assert_eq!(
        requests_for_path(&h.registry, "/d").await,
        1,
        "second arrival adds a parent edge, not a fetch"
    );
}

#[tokio::test]
async fn test_negative_results_cached_across_runs() {
    let h = harness(test_config()).await;
    // No mocks for package a anywhere: every source answers 404.

    let (keys, catalog) = catalog_of(&[("a", "1.0.0")]);
    let tree = h
        .builder
        .resolve_dependency_tree(&keys, &catalog, Ecosystem::Npm, &NoOpSink)
        .await;
    assert!(tree.is_empty());

    let aggregator_path = "/v3/systems/NPM/packages/a/versions/1.0.0:dependencies";
    assert_eq!(requests_for_path(&h.aggregator, aggregator_path).await, 1);
    assert_eq!(requests_for_path(&h.registry, "/a").await, 1);
    assert_eq!(requests_for_path(&h.fallback, "/api/NPM/a").await, 1);

    // Second run on the same resolver: every lookup is a memoized negative.
    let tree = h
        .builder
        .resolve_dependency_tree(&keys, &catalog, Ecosystem::Npm, &NoOpSink)
        .await;
    assert!(tree.is_empty());

    assert_eq!(requests_for_path(&h.aggregator, aggregator_path).await, 1);
    assert_eq!(requests_for_path(&h.registry, "/a").await, 1);
    assert_eq!(requests_for_path(&h.fallback, "/api/NPM/a").await, 1);
}

#[tokio::test]
async fn test_left_pad_with_no_dependencies_is_leaf() {
    let h = harness(test_config()).await;
    mount_npm_packument(&h.registry, "left-pad", "1.3.0", &[]).await;

    let (keys, catalog) = catalog_of(&[("left-pad", "1.3.0")]);
    let tree = h
        .builder
        .resolve_dependency_tree(&keys, &catalog, Ecosystem::Npm, &NoOpSink)
        .await;

    assert!(tree.is_empty(), "no children means no nodes for this branch");
    assert_eq!(tree.stats().total_packages, 0);
}

#[tokio::test]
async fn test_pypi_unresolved_ranges_become_unknown() {
    let h = harness(test_config()).await;
    // Aggregator is down entirely for this run.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.aggregator)
        .await;
    Mock::given(method("GET"))
        .and(path("/pypi/requests/2.28.0/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "info": { "requires_dist": ["urllib3", "certifi"] }
        })))
        .mount(&h.registry)
        .await;

    let (keys, catalog) = catalog_of(&[("requests", "2.28.0")]);
    let tree = h
        .builder
        .resolve_dependency_tree(&keys, &catalog, Ecosystem::PyPI, &NoOpSink)
        .await;

    let urllib3 = tree.get(&PackageKey::new("urllib3", "unknown")).unwrap();
    assert_eq!(urllib3.depth, 1);
    let certifi = tree.get(&PackageKey::new("certifi", "unknown")).unwrap();
    assert_eq!(certifi.depth, 1);
}

#[tokio::test]
async fn test_unreachable_registry_defers_to_fallback() {
    let h = harness_with_unreachable_registry(test_config()).await;
    Mock::given(method("GET"))
        .and(path("/api/NPM/a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "versions": [{
                "number": "1.0.0",
                "dependencies": [
                    { "packageName": "b", "requirements": "^3.1.0", "kind": "runtime" }
                ]
            }],
            "latestReleaseNumber": "1.0.0"
        })))
        .mount(&h.fallback)
        .await;

    let (keys, catalog) = catalog_of(&[("a", "1.0.0")]);
    let tree = h
        .builder
        .resolve_dependency_tree(&keys, &catalog, Ecosystem::Npm, &NoOpSink)
        .await;

    assert!(tree.get(&PackageKey::new("b", "3.1.0")).is_some());
}

#[tokio::test]
async fn test_cyclic_graph_terminates() {
    let h = harness(test_config()).await;
    mount_npm_packument(&h.registry, "a", "1.0.0", &[("b", "1.0.0")]).await;
    mount_npm_packument(&h.registry, "b", "1.0.0", &[("a", "1.0.0")]).await;

    let (keys, catalog) = catalog_of(&[("a", "1.0.0")]);
    let tree = h
        .builder
        .resolve_dependency_tree(&keys, &catalog, Ecosystem::Npm, &NoOpSink)
        .await;

    let b = tree.get(&PackageKey::new("b", "1.0.0")).unwrap();
    assert_eq!(b.depth, 1);
    // a reappears as b's discovered dependency but is never re-expanded.
    let a = tree.get(&PackageKey::new("a", "1.0.0")).unwrap();
    assert_eq!(a.depth, 2);
    assert_eq!(requests_for_path(&h.registry, "/a").await, 1);
    assert_eq!(requests_for_path(&h.registry, "/b").await, 1);
}

#[tokio::test]
async fn test_progress_events_reported() {
    let h = harness(test_config()).await;
    mount_npm_packument(&h.registry, "a", "1.0.0", &[("b", "1.0.0")]).await;
    mount_npm_packument(&h.registry, "b", "1.0.0", &[]).await;

    let sink = VecSink::new();
    let (keys, catalog) = catalog_of(&[("a", "1.0.0")]);
    h.builder
        .resolve_dependency_tree(&keys, &catalog, Ecosystem::Npm, &sink)
        .await;

    let events = sink.events().await;
    assert!(events.len() >= 3, "one per resolved package plus completion");

    let resolving: Vec<_> = events
        .iter()
        .filter(|e| e.phase == ResolutionPhase::Resolving)
        .collect();
    assert_eq!(resolving[0].package_name, "a");
    assert_eq!(resolving[1].package_name, "b");
    assert!(resolving.windows(2).all(|w| w[0].processed < w[1].processed));

    let last = events.last().unwrap();
    assert_eq!(last.phase, ResolutionPhase::Completed);
    assert_eq!(last.percent, 100);
}

#[tokio::test]
async fn test_multiple_direct_dependencies_in_order() {
    let h = harness(test_config()).await;
    mount_npm_packument(&h.registry, "a", "1.0.0", &[("x", "1.0.0")]).await;
    mount_npm_packument(&h.registry, "b", "1.0.0", &[("y", "1.0.0")]).await;

    let (keys, catalog) = catalog_of(&[("a", "1.0.0"), ("b", "1.0.0")]);
    let sink = VecSink::new();
    let tree = h
        .builder
        .resolve_dependency_tree(&keys, &catalog, Ecosystem::Npm, &sink)
        .await;

    assert!(tree.get(&PackageKey::new("x", "1.0.0")).is_some());
    assert!(tree.get(&PackageKey::new("y", "1.0.0")).is_some());

    // a's whole subtree is expanded before b begins
    let order: Vec<String> = sink
        .events()
        .await
        .iter()
        .filter(|e| e.phase == ResolutionPhase::Resolving)
        .map(|e| e.package_name.clone())
        .collect();
    assert_eq!(order, vec!["a", "x", "b", "y"]);
}

#[tokio::test]
async fn test_missing_catalog_entry_is_skipped() {
    let h = harness(test_config()).await;
    mount_npm_packument(&h.registry, "a", "1.0.0", &[("b", "1.0.0")]).await;

    let (_, catalog) = catalog_of(&[("a", "1.0.0")]);
    let keys = vec!["ghost@0.0.0".to_string(), "a@1.0.0".to_string()];
    let tree = h
        .builder
        .resolve_dependency_tree(&keys, &catalog, Ecosystem::Npm, &NoOpSink)
        .await;

    assert!(tree.get(&PackageKey::new("b", "1.0.0")).is_some());
}

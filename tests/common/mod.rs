//! Shared test harness: a TreeBuilder wired to three mock servers

use std::sync::{Arc, Once};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use deptree::infrastructure::cache::ResponseCache;
use deptree::infrastructure::registries::{NpmRegistry, PyPiRegistry, RegistryGateway};
use deptree::infrastructure::sources::{AggregatorSource, FallbackSource};
use deptree::{ResolverConfig, TreeBuilder};

pub struct Harness {
    pub aggregator: MockServer,
    pub registry: MockServer,
    pub fallback: MockServer,
    pub builder: TreeBuilder,
}

static TRACING: Once = Once::new();

/// Route resolver logs through the test writer; filtered via `RUST_LOG`.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Fast test configuration: no pacing delay, short timeouts.
pub fn test_config() -> ResolverConfig {
    ResolverConfig {
        min_request_spacing_ms: 0,
        request_timeout_ms: 2_000,
        ..ResolverConfig::default()
    }
}

/// Build a harness whose npm and PyPI adapters, aggregator and fallback all
/// point at dedicated mock servers. The fallback platform directory is
/// mounted by default so `prepare` succeeds.
pub async fn harness(config: ResolverConfig) -> Harness {
    init_tracing();
    let aggregator = MockServer::start().await;
    let registry = MockServer::start().await;
    let fallback = MockServer::start().await;

    mount_platform_directory(&fallback).await;

    let builder = builder_for(&config, &aggregator, registry.uri(), &fallback);

    Harness {
        aggregator,
        registry,
        fallback,
        builder,
    }
}

/// Like `harness`, but the registry adapters point at an unroutable address
/// so the session reachability probe fails.
pub async fn harness_with_unreachable_registry(config: ResolverConfig) -> Harness {
    init_tracing();
    let aggregator = MockServer::start().await;
    let registry = MockServer::start().await;
    let fallback = MockServer::start().await;

    mount_platform_directory(&fallback).await;

    let builder = builder_for(&config, &aggregator, "http://127.0.0.1:1".to_string(), &fallback);

    Harness {
        aggregator,
        registry,
        fallback,
        builder,
    }
}

fn builder_for(
    config: &ResolverConfig,
    aggregator: &MockServer,
    registry_uri: String,
    fallback: &MockServer,
) -> TreeBuilder {
    let timeout = config.request_timeout();
    let cache = Arc::new(ResponseCache::new());
    let registries = RegistryGateway::new()
        .register(Box::new(
            NpmRegistry::new(timeout).with_base_url(registry_uri.clone()),
        ))
        .register(Box::new(
            PyPiRegistry::new(timeout).with_base_url(registry_uri),
        ));
    TreeBuilder::new(
        config.clone(),
        Arc::new(AggregatorSource::new(timeout).with_base_url(aggregator.uri())),
        registries,
        Arc::new(FallbackSource::new(timeout).with_base_url(fallback.uri())),
        cache,
    )
}

pub async fn mount_platform_directory(fallback: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/platforms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "name": "NPM" },
            { "name": "Pypi" },
            { "name": "Cargo" },
            { "name": "Go" }
        ])))
        .mount(fallback)
        .await;
}

/// Mount an aggregator dependency-graph response listing `direct` as DIRECT
/// nodes (plus the SELF node the real service always includes).
pub async fn mount_aggregator_deps(
    server: &MockServer,
    system: &str,
    name: &str,
    version: &str,
    direct: &[(&str, &str)],
) {
    let mut nodes = vec![serde_json::json!({
        "relation": "SELF",
        "versionKey": { "name": name, "version": version }
    })];
    for (dep_name, dep_version) in direct {
        nodes.push(serde_json::json!({
            "relation": "DIRECT",
            "versionKey": { "name": dep_name, "version": dep_version }
        }));
    }

    Mock::given(method("GET"))
        .and(path(format!(
            "/v3/systems/{}/packages/{}/versions/{}:dependencies",
            system, name, version
        )))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "nodes": nodes })),
        )
        .mount(server)
        .await;
}

/// Mount an npm packument whose single version declares `deps`.
pub async fn mount_npm_packument(
    server: &MockServer,
    name: &str,
    version: &str,
    deps: &[(&str, &str)],
) {
    let dependencies: serde_json::Map<String, serde_json::Value> = deps
        .iter()
        .map(|(n, range)| (n.to_string(), serde_json::json!(range)))
        .collect();

    Mock::given(method("GET"))
        .and(path(format!("/{}", name)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "versions": { version: { "dependencies": dependencies } },
            "dist-tags": { "latest": version }
        })))
        .mount(server)
        .await;
}

/// Count requests the server received for an exact path.
pub async fn requests_for_path(server: &MockServer, wanted: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == wanted)
        .count()
}

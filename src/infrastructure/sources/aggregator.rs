//! Preferred cross-ecosystem aggregator client (deps.dev-style API)
//!
//! The aggregator reports a package's whole dependency graph in one response;
//! only edges marked as direct relations are used here — the recursive
//! expansion discovers transitive dependencies itself, one hop at a time, so
//! consuming the aggregator's precomputed transitive edges would double-count
//! and fix the depth bookkeeping to the aggregator's view.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::domain::package::{Dependency, Ecosystem};

use super::{DependencySource, SourceError};

const DEFAULT_BASE_URL: &str = "https://api.deps.dev";

/// Client for the preferred aggregator metadata service.
pub struct AggregatorSource {
    client: Client,
    base_url: String,
}

impl AggregatorSource {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the base URL (for tests or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Translate an internal ecosystem identifier to the aggregator's system
    /// name. Ecosystems the aggregator does not index map to `None`.
    fn system_name(ecosystem: Ecosystem) -> Option<&'static str> {
        match ecosystem {
            Ecosystem::Npm => Some("NPM"),
            Ecosystem::PyPI => Some("PYPI"),
            Ecosystem::Cargo => Some("CARGO"),
            Ecosystem::Go => Some("GO"),
            Ecosystem::Maven => Some("MAVEN"),
            Ecosystem::RubyGems => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DependenciesResponse {
    #[serde(default)]
    nodes: Vec<GraphNode>,
}

#[derive(Debug, Deserialize)]
struct GraphNode {
    #[serde(default)]
    relation: String,
    #[serde(rename = "versionKey")]
    version_key: VersionKey,
}

#[derive(Debug, Deserialize)]
struct VersionKey {
    name: String,
    version: String,
}

#[async_trait]
impl DependencySource for AggregatorSource {
    fn handles(&self, ecosystem: Ecosystem) -> bool {
        Self::system_name(ecosystem).is_some()
    }

    async fn fetch_direct_dependencies(
        &self,
        ecosystem: Ecosystem,
        name: &str,
        version: &str,
    ) -> Result<Option<Vec<Dependency>>, SourceError> {
        // Unsupported ecosystems are a non-answer, no network call is made.
        let Some(system) = Self::system_name(ecosystem) else {
            debug!(%ecosystem, "ecosystem not indexed by aggregator");
            return Ok(None);
        };

        let url = format!(
            "{}/v3/systems/{}/packages/{}/versions/{}:dependencies",
            self.base_url, system, name, version
        );
        debug!(source = "aggregator", %ecosystem, package = name, version, "fetching dependencies");

        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        let body: DependenciesResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        let deps: Vec<Dependency> = body
            .nodes
            .into_iter()
            .filter(|node| node.relation == "DIRECT")
            .map(|node| Dependency::new(node.version_key.name, node.version_key.version))
            .collect();

        Ok(Some(deps))
    }
}

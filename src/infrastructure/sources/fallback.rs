//! Fallback cross-ecosystem aggregator client (libraries.io-style API)
//!
//! Consulted after the preferred aggregator and the native registry both come
//! up empty, and as the sole source for ecosystems whose native registry is
//! unreachable from the calling context. The service addresses ecosystems by
//! its own registry slugs; the slug directory is fetched once per session
//! through `prepare` and held as a typed immutable map.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::domain::package::{Dependency, Ecosystem};
use crate::services::version_normalizer::{
    normalize_requirement, strip_version_prefix, UNKNOWN_VERSION,
};

use super::{DependencySource, SourceError};

const DEFAULT_BASE_URL: &str = "https://libraries.io";

/// Ecosystems for which only the latest release record is reliably populated;
/// for these the latest release is used when no version record matches.
const LATEST_ONLY: &[Ecosystem] = &[Ecosystem::Go, Ecosystem::Maven];

/// Client for the secondary aggregator metadata service.
pub struct FallbackSource {
    client: Client,
    base_url: String,
    platforms: OnceCell<HashMap<Ecosystem, String>>,
}

impl FallbackSource {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            platforms: OnceCell::new(),
        }
    }

    /// Override the base URL (for tests or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn load_platforms(&self) -> Result<HashMap<Ecosystem, String>, SourceError> {
        let url = format!("{}/api/platforms", self.base_url);
        debug!(source = "fallback", "loading platform directory");

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let records: Vec<PlatformRecord> = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        let mut map = HashMap::new();
        for record in records {
            if let Ok(ecosystem) = record.name.parse::<Ecosystem>() {
                map.insert(ecosystem, record.name);
            }
        }
        debug!(platforms = map.len(), "platform directory loaded");
        Ok(map)
    }

    /// Pick the version record to read dependencies from: exact match first,
    /// then normalized match (leading `v` stripped on either side), then the
    /// latest release for ecosystems known to populate only that record.
    fn select_version<'a>(
        ecosystem: Ecosystem,
        package: &'a PackageRecord,
        version: &str,
    ) -> Option<&'a VersionRecord> {
        if let Some(record) = package.versions.iter().find(|v| v.number == version) {
            return Some(record);
        }
        let wanted = strip_version_prefix(version);
        if let Some(record) = package
            .versions
            .iter()
            .find(|v| strip_version_prefix(&v.number) == wanted)
        {
            return Some(record);
        }
        if LATEST_ONLY.contains(&ecosystem) {
            if let Some(latest) = &package.latest_release_number {
                return package.versions.iter().find(|v| &v.number == latest);
            }
        }
        None
    }

    fn is_runtime_kind(kind: &Option<String>) -> bool {
        match kind {
            None => true,
            Some(k) => {
                let k = k.to_lowercase();
                k.is_empty() || k == "runtime" || k == "normal"
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlatformRecord {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PackageRecord {
    #[serde(default)]
    versions: Vec<VersionRecord>,
    #[serde(rename = "latestReleaseNumber")]
    latest_release_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionRecord {
    number: String,
    #[serde(default)]
    dependencies: Vec<DependencyRecord>,
}

#[derive(Debug, Deserialize)]
struct DependencyRecord {
    #[serde(rename = "packageName")]
    package_name: String,
    requirements: Option<String>,
    kind: Option<String>,
}

#[async_trait]
impl DependencySource for FallbackSource {
    /// Fetch and cache the ecosystem -> registry-slug directory. Called once
    /// by the tree builder before any resolution begins.
    async fn prepare(&self) -> Result<(), SourceError> {
        self.platforms
            .get_or_try_init(|| self.load_platforms())
            .await?;
        Ok(())
    }

    /// Until the platform directory is loaded every ecosystem is assumed
    /// answerable; afterwards only ecosystems with a registry slug are.
    fn handles(&self, ecosystem: Ecosystem) -> bool {
        self.platforms
            .get()
            .map_or(true, |map| map.contains_key(&ecosystem))
    }

    async fn fetch_direct_dependencies(
        &self,
        ecosystem: Ecosystem,
        name: &str,
        version: &str,
    ) -> Result<Option<Vec<Dependency>>, SourceError> {
        let platforms = self
            .platforms
            .get_or_try_init(|| self.load_platforms())
            .await?;
        let Some(slug) = platforms.get(&ecosystem) else {
            warn!(%ecosystem, "no registry slug for ecosystem in fallback directory");
            return Ok(None);
        };

        let url = format!("{}/api/{}/{}", self.base_url, slug, name);
        debug!(source = "fallback", %ecosystem, package = name, version, "fetching dependencies");

        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        let package: PackageRecord = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        let Some(record) = Self::select_version(ecosystem, &package, version) else {
            debug!(package = name, version, "no matching version record in fallback");
            return Ok(None);
        };

        let deps: Vec<Dependency> = record
            .dependencies
            .iter()
            .filter(|d| Self::is_runtime_kind(&d.kind))
            .map(|d| {
                let version = d
                    .requirements
                    .as_deref()
                    .map(normalize_requirement)
                    .unwrap_or_else(|| UNKNOWN_VERSION.to_string());
                Dependency::new(d.package_name.clone(), version)
            })
            .collect();

        Ok(Some(deps))
    }
}

//! crates.io registry adapter
//!
//! Dependency data lives behind a per-version endpoint, so every lookup is
//! two calls: the crate document (version list plus the newest-version
//! pointer) and then that version's dependency list. Only `kind == "normal"`
//! non-optional entries are kept.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::domain::package::{Dependency, Ecosystem};
use crate::infrastructure::cache::ResponseCache;
use crate::infrastructure::sources::SourceError;
use crate::services::version_normalizer::normalize_requirement;

use super::RegistryAdapter;

const DEFAULT_BASE_URL: &str = "https://crates.io";

pub struct CratesIoRegistry {
    client: Client,
    base_url: String,
    cache: Option<Arc<ResponseCache>>,
}

impl CratesIoRegistry {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("deptree (dependency tree resolver)")
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            cache: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Share the session cache so newest-version pointers are memoized
    /// across lookups of the same crate.
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Resolve the version record to query: exact match, else the crate's
    /// newest-version pointer.
    fn select_version(document: &CrateDocument, version: &str) -> Option<String> {
        if document.versions.iter().any(|v| v.num == version) {
            return Some(version.to_string());
        }
        document.krate.newest_version.clone()
    }
}

#[derive(Debug, Deserialize)]
struct CrateDocument {
    #[serde(rename = "crate")]
    krate: CrateInfo,
    #[serde(default)]
    versions: Vec<VersionRecord>,
}

#[derive(Debug, Deserialize)]
struct CrateInfo {
    newest_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionRecord {
    num: String,
}

#[derive(Debug, Deserialize)]
struct DependenciesDocument {
    #[serde(default)]
    dependencies: Vec<DependencyRecord>,
}

#[derive(Debug, Deserialize)]
struct DependencyRecord {
    crate_id: String,
    req: String,
    kind: String,
    #[serde(default)]
    optional: bool,
}

#[async_trait]
impl RegistryAdapter for CratesIoRegistry {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Cargo
    }

    async fn probe(&self) -> bool {
        self.client.get(&self.base_url).send().await.is_ok()
    }

    async fn fetch_direct_dependencies(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<Vec<Dependency>>, SourceError> {
        debug!(source = "registry", ecosystem = "cargo", package = name, version, "fetching crate");

        // The crate document is only needed to resolve the version; when the
        // requested version is already the memoized newest pointer, skip it.
        let mut resolved_version = None;
        if let Some(cache) = &self.cache {
            if let Some(Some(newest)) = cache.get_latest(Ecosystem::Cargo, name).await {
                if newest == version {
                    resolved_version = Some(newest);
                }
            }
        }

        let resolved_version = match resolved_version {
            Some(v) => v,
            None => {
                let crate_url = format!("{}/api/v1/crates/{}", self.base_url, name);
                let response = self.client.get(&crate_url).send().await?;
                if response.status() == reqwest::StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                let document: CrateDocument = response
                    .error_for_status()?
                    .json()
                    .await
                    .map_err(|e| SourceError::Parse(e.to_string()))?;

                if let Some(cache) = &self.cache {
                    cache
                        .put_latest(Ecosystem::Cargo, name, document.krate.newest_version.clone())
                        .await;
                }

                match Self::select_version(&document, version) {
                    Some(v) => v,
                    None => return Ok(None),
                }
            }
        };

        let deps_url = format!(
            "{}/api/v1/crates/{}/{}/dependencies",
            self.base_url, name, resolved_version
        );
        let response = self.client.get(&deps_url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let deps_doc: DependenciesDocument = response
            .error_for_status()?
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        let deps = deps_doc
            .dependencies
            .into_iter()
            .filter(|d| d.kind == "normal" && !d.optional)
            .map(|d| Dependency::new(d.crate_id, normalize_requirement(&d.req)))
            .collect();
        Ok(Some(deps))
    }
}

//! PyPI registry adapter
//!
//! PyPI's JSON API is addressed per release, so an exact miss costs a second
//! call to the project endpoint, which serves the latest release. Dependency
//! specifiers come from `requires_dist` in PEP 508 form
//! (`urllib3 (<1.27,>=1.21.1) ; python_version >= "3.7"`); entries gated on
//! an `extra` marker are optional and excluded.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::domain::package::{Dependency, Ecosystem};
use crate::infrastructure::sources::SourceError;
use crate::services::version_normalizer::normalize_requirement;

use super::RegistryAdapter;

const DEFAULT_BASE_URL: &str = "https://pypi.org";

pub struct PyPiRegistry {
    client: Client,
    base_url: String,
}

impl PyPiRegistry {
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

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_release(&self, url: &str) -> Result<Option<ReleaseDocument>, SourceError> {
        let response = self.client.get(url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        let doc = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;
        Ok(Some(doc))
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseDocument {
    info: ReleaseInfo,
}

#[derive(Debug, Deserialize)]
struct ReleaseInfo {
    #[serde(default)]
    requires_dist: Option<Vec<String>>,
}

/// Parse one PEP 508 requirement into a dependency, or `None` for entries
/// that only apply to an extra.
fn parse_requirement(spec: &str) -> Option<Dependency> {
    let (requirement, marker) = match spec.split_once(';') {
        Some((req, marker)) => (req.trim(), Some(marker)),
        None => (spec.trim(), None),
    };
    if let Some(marker) = marker {
        if marker.contains("extra") {
            return None;
        }
    }

    let name_end = requirement
        .find(|c: char| c.is_whitespace() || "(<>=!~[".contains(c))
        .unwrap_or(requirement.len());
    let name = &requirement[..name_end];
    if name.is_empty() {
        return None;
    }

    let version = normalize_requirement(&requirement[name_end..]);
    Some(Dependency::new(name, version))
}

#[async_trait]
impl RegistryAdapter for PyPiRegistry {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::PyPI
    }

    async fn probe(&self) -> bool {
        self.client.get(&self.base_url).send().await.is_ok()
    }

    async fn fetch_direct_dependencies(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<Vec<Dependency>>, SourceError> {
        debug!(source = "registry", ecosystem = "pypi", package = name, version, "fetching release");

        let exact_url = format!("{}/pypi/{}/{}/json", self.base_url, name, version);
        let document = match self.fetch_release(&exact_url).await? {
            Some(doc) => Some(doc),
            None => {
                // Second call: the project endpoint serves the latest release.
                let latest_url = format!("{}/pypi/{}/json", self.base_url, name);
                self.fetch_release(&latest_url).await?
            }
        };
        let Some(document) = document else {
            return Ok(None);
        };

        let Some(requires_dist) = document.info.requires_dist else {
            return Ok(Some(Vec::new()));
        };
        let deps = requires_dist
            .iter()
            .filter_map(|spec| parse_requirement(spec))
            .collect();
        Ok(Some(deps))
    }
}

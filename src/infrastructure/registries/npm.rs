//! npm registry adapter
//!
//! One call to the packument endpoint yields every version's manifest plus
//! the dist-tags. Only the `dependencies` table of the matched manifest is
//! read; `devDependencies` and `optionalDependencies` are never requested.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::domain::package::{Dependency, Ecosystem};
use crate::infrastructure::sources::SourceError;
use crate::services::version_normalizer::normalize_requirement;

use super::RegistryAdapter;

const DEFAULT_BASE_URL: &str = "https://registry.npmjs.org";

pub struct NpmRegistry {
    client: Client,
    base_url: String,
}

impl NpmRegistry {
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
}

#[derive(Debug, Deserialize)]
struct Packument {
    #[serde(default)]
    versions: BTreeMap<String, VersionManifest>,
    #[serde(rename = "dist-tags", default)]
    dist_tags: DistTags,
}

#[derive(Debug, Deserialize, Default)]
struct DistTags {
    latest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionManifest {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

impl Packument {
    /// The exact version's manifest, or the one behind the `latest` tag.
    fn manifest_for(&self, version: &str) -> Option<&VersionManifest> {
        self.versions.get(version).or_else(|| {
            let latest = self.dist_tags.latest.as_deref()?;
            self.versions.get(latest)
        })
    }
}

#[async_trait]
impl RegistryAdapter for NpmRegistry {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Npm
    }

    async fn probe(&self) -> bool {
        self.client.get(&self.base_url).send().await.is_ok()
    }

    async fn fetch_direct_dependencies(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<Vec<Dependency>>, SourceError> {
        let url = format!("{}/{}", self.base_url, name);
        debug!(source = "registry", ecosystem = "npm", package = name, version, "fetching packument");

        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        let packument: Packument = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        let Some(manifest) = packument.manifest_for(version) else {
            return Ok(None);
        };

        let deps = manifest
            .dependencies
            .iter()
            .map(|(dep_name, range)| Dependency::new(dep_name.clone(), normalize_requirement(range)))
            .collect();
        Ok(Some(deps))
    }
}

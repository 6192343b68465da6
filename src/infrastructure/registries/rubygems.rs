//! RubyGems registry adapter
//!
//! The v2 version endpoint carries dependencies split by group; only the
//! `runtime` group is read. A miss on the exact version falls back to the v1
//! gem endpoint, which describes the latest release.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::domain::package::{Dependency, Ecosystem};
use crate::infrastructure::sources::SourceError;
use crate::services::version_normalizer::normalize_requirement;

use super::RegistryAdapter;

const DEFAULT_BASE_URL: &str = "https://rubygems.org";

pub struct RubyGemsRegistry {
    client: Client,
    base_url: String,
}

impl RubyGemsRegistry {
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

    async fn fetch_gem(&self, url: &str) -> Result<Option<GemDocument>, SourceError> {
        let response = self.client.get(url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let document = response
            .error_for_status()?
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;
        Ok(Some(document))
    }
}

#[derive(Debug, Deserialize)]
struct GemDocument {
    #[serde(default)]
    dependencies: GemDependencies,
}

#[derive(Debug, Deserialize, Default)]
struct GemDependencies {
    #[serde(default)]
    runtime: Vec<GemDependency>,
}

#[derive(Debug, Deserialize)]
struct GemDependency {
    name: String,
    requirements: String,
}

#[async_trait]
impl RegistryAdapter for RubyGemsRegistry {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::RubyGems
    }

    async fn probe(&self) -> bool {
        self.client.get(&self.base_url).send().await.is_ok()
    }

    async fn fetch_direct_dependencies(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<Vec<Dependency>>, SourceError> {
        debug!(source = "registry", ecosystem = "rubygems", package = name, version, "fetching gem");

        let exact_url = format!(
            "{}/api/v2/rubygems/{}/versions/{}.json",
            self.base_url, name, version
        );
        let document = match self.fetch_gem(&exact_url).await? {
            Some(doc) => Some(doc),
            None => {
                // Latest-release fallback via the v1 gem endpoint.
                let latest_url = format!("{}/api/v1/gems/{}.json", self.base_url, name);
                self.fetch_gem(&latest_url).await?
            }
        };
        let Some(document) = document else {
            return Ok(None);
        };

        let deps = document
            .dependencies
            .runtime
            .into_iter()
            .map(|d| Dependency::new(d.name, normalize_requirement(&d.requirements)))
            .collect();
        Ok(Some(deps))
    }
}

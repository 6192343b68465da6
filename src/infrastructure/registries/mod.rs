//! Native package registry adapters
//!
//! One adapter per ecosystem whose registry exposes per-version dependency
//! metadata. Adapters resolve the requested version record (falling back to
//! the registry's "latest" pointer when the exact version is absent), extract
//! the declared runtime dependencies, and reduce each requirement to a
//! concrete version token. Build-only, dev-only and optional dependencies are
//! excluded.
//!
//! Some registries may be unreachable from the calling environment. Each
//! adapter's base endpoint is probed once per session through the
//! `RegistryGateway`; after a failed probe the adapter is bypassed for the
//! rest of the session and callers defer directly to the fallback source.

pub mod crates_io;
pub mod npm;
pub mod pypi;
pub mod rubygems;

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::package::{Dependency, Ecosystem};

use super::sources::SourceError;

pub use crates_io::CratesIoRegistry;
pub use npm::NpmRegistry;
pub use pypi::PyPiRegistry;
pub use rubygems::RubyGemsRegistry;

/// An adapter for one ecosystem's native package registry.
#[async_trait]
pub trait RegistryAdapter: Send + Sync {
    /// The ecosystem this adapter serves.
    fn ecosystem(&self) -> Ecosystem;

    /// Check whether the registry is reachable at all. Called at most once
    /// per session by the gateway.
    async fn probe(&self) -> bool;

    /// Fetch the declared runtime dependencies of `name@version`, resolving
    /// the closest-matching version record when the exact one is absent.
    async fn fetch_direct_dependencies(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<Vec<Dependency>>, SourceError>;
}

/// Routes registry lookups to the adapter for the requested ecosystem,
/// memoizing each adapter's reachability for the session.
pub struct RegistryGateway {
    adapters: HashMap<Ecosystem, Box<dyn RegistryAdapter>>,
    reachability: Mutex<HashMap<Ecosystem, bool>>,
}

impl RegistryGateway {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
            reachability: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(mut self, adapter: Box<dyn RegistryAdapter>) -> Self {
        self.adapters.insert(adapter.ecosystem(), adapter);
        self
    }

    /// Fetch via the ecosystem's adapter, or report a non-answer when no
    /// adapter exists or the registry failed its session probe.
    pub async fn fetch(
        &self,
        ecosystem: Ecosystem,
        name: &str,
        version: &str,
    ) -> Result<Option<Vec<Dependency>>, SourceError> {
        let Some(adapter) = self.adapters.get(&ecosystem) else {
            return Err(SourceError::UnsupportedEcosystem(ecosystem));
        };

        if !self.is_reachable(ecosystem, adapter.as_ref()).await {
            debug!(%ecosystem, "registry bypassed after failed session probe");
            return Ok(None);
        }

        adapter.fetch_direct_dependencies(name, version).await
    }

    /// Whether a fetch for this ecosystem would go out on the wire: an
    /// adapter must exist and must not have failed its session probe. An
    /// unprobed adapter counts, since the probe itself is a request.
    pub async fn will_request(&self, ecosystem: Ecosystem) -> bool {
        if !self.adapters.contains_key(&ecosystem) {
            return false;
        }
        self.reachability
            .lock()
            .await
            .get(&ecosystem)
            .copied()
            .unwrap_or(true)
    }

    async fn is_reachable(&self, ecosystem: Ecosystem, adapter: &dyn RegistryAdapter) -> bool {
        let mut cache = self.reachability.lock().await;
        if let Some(&known) = cache.get(&ecosystem) {
            return known;
        }
        let reachable = adapter.probe().await;
        if !reachable {
            warn!(%ecosystem, "registry probe failed; deferring to fallback source for this session");
        }
        cache.insert(ecosystem, reachable);
        reachable
    }
}

impl Default for RegistryGateway {
    fn default() -> Self {
        Self::new()
    }
}

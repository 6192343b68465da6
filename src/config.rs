//! Resolver configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a dependency tree resolution run.
///
/// All fields have defaults matching the persisted settings of the original
/// deployment; consumers usually construct this via `Default` and override
/// individual knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum expansion depth. Packages discovered at this depth remain in
    /// the tree but their own dependencies are never fetched.
    pub max_depth: u32,
    /// Timeout for a single outbound source call (in milliseconds).
    pub request_timeout_ms: u64,
    /// Minimum spacing enforced between outbound requests across all
    /// sources (in milliseconds).
    pub min_request_spacing_ms: u64,
    /// Estimated dependency fan-out per direct dependency, used only for the
    /// heuristic progress total.
    pub fan_out_estimate: usize,
    /// Upper bound on the heuristic progress total.
    pub progress_total_cap: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            request_timeout_ms: 10_000,
            min_request_spacing_ms: 100,
            fan_out_estimate: 5,
            progress_total_cap: 500,
        }
    }
}

impl ResolverConfig {
    /// Per-call timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Minimum request spacing as a `Duration`.
    pub fn min_request_spacing(&self) -> Duration {
        Duration::from_millis(self.min_request_spacing_ms)
    }
}

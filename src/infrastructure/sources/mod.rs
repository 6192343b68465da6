//! Cross-ecosystem metadata sources
//!
//! Two aggregator services are consulted around the native registries: a
//! preferred aggregator tried first, and a fallback aggregator tried when the
//! preferred one and the native registry both come up empty. Both implement
//! the `DependencySource` trait below.
//!
//! Every failure mode a source can hit is captured by `SourceError` and
//! caught at the single call site in the tree builder, where it becomes
//! "this source has nothing" — errors never propagate out of the expansion.

pub mod aggregator;
pub mod fallback;

use async_trait::async_trait;

use crate::domain::package::{Dependency, Ecosystem};

pub use aggregator::AggregatorSource;
pub use fallback::FallbackSource;

/// Error type for metadata source and registry operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Expected negative (404-equivalent).
    #[error("package not found")]
    NotFound,

    /// The source exceeded its per-call time budget.
    #[error("source call timed out")]
    Timeout,

    /// Network-level failure (optional status code).
    #[error("transport error: {message}, status={status:?}")]
    Transport {
        message: String,
        status: Option<u16>,
    },

    /// Response body could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// No adapter or mapping exists for the requested ecosystem.
    #[error("unsupported ecosystem: {0}")]
    UnsupportedEcosystem(Ecosystem),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return SourceError::Timeout;
        }
        if err.is_decode() {
            return SourceError::Parse(err.to_string());
        }
        let status = err.status().map(|s| s.as_u16());
        if status == Some(404) {
            return SourceError::NotFound;
        }
        SourceError::Transport {
            message: err.to_string(),
            status,
        }
    }
}

/// A cross-ecosystem dependency metadata source.
///
/// `Ok(None)` means the source has no answer for this package (a normal
/// negative); `Ok(Some(vec![]))` is treated identically by callers.
#[async_trait]
pub trait DependencySource: Send + Sync {
    /// One-time initialization before the first resolution run. Sources with
    /// no setup keep the default no-op.
    async fn prepare(&self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Whether a fetch for this ecosystem would go out on the wire at all.
    /// Callers skip rate-limit accounting for ecosystems a source does not
    /// index.
    fn handles(&self, _ecosystem: Ecosystem) -> bool {
        true
    }

    /// Fetch the declared direct dependencies of `name@version`.
    async fn fetch_direct_dependencies(
        &self,
        ecosystem: Ecosystem,
        name: &str,
        version: &str,
    ) -> Result<Option<Vec<Dependency>>, SourceError>;
}

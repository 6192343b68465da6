//! Global outbound request pacing
//!
//! One shared gate enforces minimum spacing between outbound requests across
//! all sources. The spacing is global, not per-source: the external services
//! this crate talks to are rate limited individually, but a single gate keeps
//! total request pressure predictable and lets the sequential resolver avoid
//! any cross-task coordination.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Enforces a minimum delay between consecutive `acquire` calls.
pub struct RequestPacer {
    spacing: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last_request: Mutex::new(None),
        }
    }

    /// Wait until the configured spacing since the previous request has
    /// elapsed, then stamp the new request time. The lock is held across the
    /// sleep so concurrent callers are serialized through the same gate.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.spacing {
                let wait = self.spacing - elapsed;
                trace!(wait_ms = wait.as_millis() as u64, "pacing outbound request");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

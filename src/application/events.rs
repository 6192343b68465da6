//! Progress events emitted during a resolution run
//!
//! Callers can observe resolution progress through the `ProgressSink` trait;
//! the builder reports an event after every package is marked resolved. The
//! `total` carried by events is a heuristic estimate, not an exact count —
//! consumers must treat it (and `percent`) as approximate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Phase of the resolution run an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPhase {
    Resolving,
    Completed,
}

/// A single progress update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionProgress {
    pub phase: ResolutionPhase,
    pub message: String,
    pub package_name: String,
    pub processed: usize,
    /// Heuristic estimate: direct-dependency count times a fan-out factor,
    /// capped. May undershoot the real package count.
    pub total: usize,
    pub percent: u8,
}

/// Sink for progress events.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, event: ResolutionProgress);
}

/// Sink that discards all events.
pub struct NoOpSink;

#[async_trait]
impl ProgressSink for NoOpSink {
    async fn report(&self, _event: ResolutionProgress) {}
}

/// Sink that collects events into a vector, for tests and polling consumers.
#[derive(Default)]
pub struct VecSink {
    events: Arc<tokio::sync::Mutex<Vec<ResolutionProgress>>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ResolutionProgress> {
        self.events.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }
}

#[async_trait]
impl ProgressSink for VecSink {
    async fn report(&self, event: ResolutionProgress) {
        self.events.lock().await.push(event);
    }
}

//! Infrastructure: source clients, registry adapters, caching and pacing

pub mod cache;
pub mod pacing;
pub mod registries;
pub mod sources;

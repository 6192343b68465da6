//! Application-level seams: progress events and sinks

pub mod events;

pub use events::{NoOpSink, ProgressSink, ResolutionPhase, ResolutionProgress, VecSink};

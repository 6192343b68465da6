//! Resolution services

pub mod tree_builder;
pub mod version_normalizer;

pub use tree_builder::{InMemoryCatalog, PackageCatalog, TreeBuilder};
pub use version_normalizer::{normalize_requirement, UNKNOWN_VERSION};

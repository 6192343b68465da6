//! Transitive dependency tree resolution across package ecosystems.
//!
//! This crate builds the full transitive dependency graph for a set of
//! declared direct dependencies by querying multiple, unreliable external
//! metadata sources and merging their partial answers into one consistent
//! tree. For every package the resolver consults, in order, a cross-ecosystem
//! aggregator, the package's native registry, and a secondary aggregator used
//! as a fallback; the first source that yields a non-empty dependency list
//! wins, and a package for which every source comes up empty is a leaf.
//!
//! # Supported Ecosystems
//!
//! | Ecosystem | Native registry adapter |
//! |-----------|-------------------------|
//! | npm | yes |
//! | PyPI | yes |
//! | Cargo | yes |
//! | RubyGems | yes |
//! | Go | aggregator/fallback only |
//! | Maven | aggregator/fallback only |
//!
//! # Features
//!
//! - **Multi-source fallback** — aggregator, native registry, then fallback
//!   aggregator, each failure swallowed and logged, never fatal
//! - **Session caching** — per-source memo tables with explicit negative
//!   markers so no lookup is repeated within a run
//! - **Global request pacing** — one shared gate enforcing minimum spacing
//!   between outbound requests across all sources
//! - **Bounded traversal** — configurable depth limit plus per-key revisit
//!   suppression guarantee termination on cyclic real-world graphs
//!
//! # Usage
//!
//! ```rust,ignore
//! use deptree::{Ecosystem, ResolverConfig, TreeBuilder};
//! use deptree::application::events::NoOpSink;
//! use deptree::services::tree_builder::InMemoryCatalog;
//!
//! let builder = TreeBuilder::from_config(ResolverConfig::default());
//! let tree = builder
//!     .resolve_dependency_tree(&direct_keys, &catalog, Ecosystem::Npm, &NoOpSink)
//!     .await;
//! let stats = tree.stats();
//! ```
//!
//! # Architecture
//!
//! ```text
//! deptree/
//! ├── domain/          # PackageKey, TreeNode, DependencyTree value types
//! ├── application/     # Progress events and sink trait
//! ├── services/        # TreeBuilder orchestration, version normalization
//! └── infrastructure/  # Source clients, registry adapters, cache, pacing
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use config::ResolverConfig;
pub use domain::package::{Dependency, Ecosystem, PackageKey, PackageRef};
pub use domain::tree::{DependencyTree, TreeNode, TreeStats};
pub use services::tree_builder::{PackageCatalog, TreeBuilder};

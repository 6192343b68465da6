//! Domain value types for dependency tree resolution

pub mod package;
pub mod tree;

pub use package::{Dependency, Ecosystem, PackageKey, PackageRef};
pub use tree::{DependencyTree, TreeNode, TreeStats};

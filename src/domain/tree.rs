//! Dependency tree data structures
//!
//! The tree maps each discovered package instance (`name@version`) to a node
//! carrying its first-discovery depth and its parent/child link sets. Direct
//! dependencies themselves are not stored as nodes; only the packages
//! discovered while expanding them are.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::package::PackageKey;

/// A resolved package instance in the dependency tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    pub version: String,
    /// Depth at which this package was first discovered (>= 1). Fixed at
    /// first discovery; never lowered when a shorter path is found later.
    pub depth: u32,
    /// Keys of every package that declared this one as a dependency. A node
    /// reached through two distinct chains (diamond) has multiple parents.
    pub parents: BTreeSet<PackageKey>,
    /// Keys of this package's own discovered dependencies.
    pub children: BTreeSet<PackageKey>,
}

impl TreeNode {
    pub fn new(name: &str, version: &str, depth: u32, parent: PackageKey) -> Self {
        let mut parents = BTreeSet::new();
        parents.insert(parent);
        Self {
            name: name.to_string(),
            version: version.to_string(),
            depth,
            parents,
            children: BTreeSet::new(),
        }
    }
}

/// Aggregate statistics over one resolved tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    pub total_packages: usize,
    pub by_depth: BTreeMap<u32, usize>,
    pub max_depth: u32,
    pub packages_with_multiple_parents: usize,
}

/// The resolution output artifact: mapping `PackageKey` -> `TreeNode`.
///
/// Owned exclusively by the tree builder during a run, then handed to the
/// caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyTree {
    pub nodes: HashMap<PackageKey, TreeNode>,
}

impl DependencyTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &PackageKey) -> Option<&TreeNode> {
        self.nodes.get(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Record a discovered dependency edge.
    ///
    /// Inserts a new node at `depth` if the key is unseen; otherwise only
    /// adds `parent` to the existing node's parent set, leaving the
    /// first-discovery depth untouched. The parent's child set is updated
    /// when the parent itself is a tree node (it is not one for direct
    /// dependencies).
    pub fn record_dependency(
        &mut self,
        parent: &PackageKey,
        name: &str,
        version: &str,
        depth: u32,
    ) -> PackageKey {
        let key = PackageKey::new(name, version);
        match self.nodes.get_mut(&key) {
            Some(node) => {
                node.parents.insert(parent.clone());
            }
            None => {
                self.nodes
                    .insert(key.clone(), TreeNode::new(name, version, depth, parent.clone()));
            }
        }
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.insert(key.clone());
        }
        key
    }

    /// Compute aggregate statistics in a single pass over the tree.
    pub fn stats(&self) -> TreeStats {
        let mut by_depth: BTreeMap<u32, usize> = BTreeMap::new();
        let mut max_depth = 0;
        let mut packages_with_multiple_parents = 0;

        for node in self.nodes.values() {
            *by_depth.entry(node.depth).or_insert(0) += 1;
            if node.depth > max_depth {
                max_depth = node.depth;
            }
            if node.parents.len() > 1 {
                packages_with_multiple_parents += 1;
            }
        }

        TreeStats {
            total_packages: self.nodes.len(),
            by_depth,
            max_depth,
            packages_with_multiple_parents,
        }
    }

    /// Export the tree to a JSON structure suitable for downstream
    /// visualization.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "nodes": self.nodes.values().map(|n| {
                serde_json::json!({
                    "id": PackageKey::new(&n.name, &n.version).as_str(),
                    "name": n.name,
                    "version": n.version,
                    "depth": n.depth,
                    "parents": n.parents.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
                })
            }).collect::<Vec<_>>(),
            "links": self.nodes.iter().flat_map(|(key, n)| {
                n.children.iter().map(move |child| {
                    serde_json::json!({
                        "source": key.as_str(),
                        "target": child.as_str(),
                    })
                })
            }).collect::<Vec<_>>(),
        })
    }
}

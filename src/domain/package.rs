//! Package identity types shared across sources and the tree builder

use serde::{Deserialize, Serialize};

/// A package-managing platform/language domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Npm,
    PyPI,
    Cargo,
    Go,
    Maven,
    RubyGems,
}

impl Ecosystem {
    /// Canonical lowercase name used in cache keys and logs.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::PyPI => "pypi",
            Ecosystem::Cargo => "cargo",
            Ecosystem::Go => "go",
            Ecosystem::Maven => "maven",
            Ecosystem::RubyGems => "rubygems",
        }
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.canonical_name())
    }
}

impl std::str::FromStr for Ecosystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "npm" => Ok(Ecosystem::Npm),
            "pypi" | "pip" | "python" => Ok(Ecosystem::PyPI),
            "cargo" | "rust" | "crates.io" => Ok(Ecosystem::Cargo),
            "go" | "golang" => Ok(Ecosystem::Go),
            "maven" => Ok(Ecosystem::Maven),
            "rubygems" | "gem" | "ruby" => Ok(Ecosystem::RubyGems),
            other => Err(format!("unknown ecosystem: {}", other)),
        }
    }
}

/// Unique identity of one resolved package instance: `name@version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageKey(String);

impl PackageKey {
    pub fn new(name: &str, version: &str) -> Self {
        Self(format!("{}@{}", name, version))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved name/version pair, as returned by the package catalog for a
/// direct dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
    pub version: String,
}

impl PackageRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn key(&self) -> PackageKey {
        PackageKey::new(&self.name, &self.version)
    }
}

/// A discovered direct dependency of some package, with the requirement
/// already reduced to a concrete version token (possibly `"unknown"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: String,
}

impl Dependency {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn key(&self) -> PackageKey {
        PackageKey::new(&self.name, &self.version)
    }
}

//! Best-effort reduction of version requirement strings to concrete tokens
//!
//! Registries and aggregators report dependency requirements as free-text
//! ranges (`^1.2.3`, `~> 2.0`, `>= 1.0, < 2.0`). The resolver needs one
//! concrete version token per dependency to form its `name@version` identity,
//! so requirements are reduced by extracting the first numeric version-like
//! run. When no number can be found the explicit `"unknown"` token is used —
//! an honest answer the rest of the pipeline handles uniformly.

use once_cell::sync::Lazy;
use regex::Regex;

/// Token used when no concrete version can be derived from a requirement.
pub const UNKNOWN_VERSION: &str = "unknown";

static VERSION_TOKEN: Lazy<Regex> = Lazy::new(|| {
    // A run of dot-separated numbers, optionally followed by a pre-release
    // or build suffix (1.0.0-alpha.1, 2.3.4+build5).
    Regex::new(r"\d+(?:\.\d+)*(?:[-+][0-9A-Za-z.]+)?").expect("invalid version token pattern")
});

/// Reduce a version-range or requirement string to one concrete token.
pub fn normalize_requirement(requirement: &str) -> String {
    let trimmed = requirement.trim();
    if trimmed.is_empty() {
        return UNKNOWN_VERSION.to_string();
    }
    match VERSION_TOKEN.find(trimmed) {
        Some(m) => m.as_str().to_string(),
        None => UNKNOWN_VERSION.to_string(),
    }
}

/// Strip a leading version-prefix character (`v1.2.3` -> `1.2.3`) for
/// normalized-version matching against registry records.
pub fn strip_version_prefix(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

//! Registry configuration (.lyrerc) handling.
//!
//! The registry configuration file is a sibling of the package manifest.
//! Reading it is best-effort throughout: a missing, unreadable, or
//! unparsable file behaves exactly like a file with no flags set.

use serde::Deserialize;
use std::path::Path;

/// File name of the per-project registry configuration.
pub const REGISTRY_CONFIG_FILE: &str = ".lyrerc";

/// Parsed registry configuration flags.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// When set, the manifest's `engines.runtime` range is enforced against
    /// the actual host runtime version before the program runs.
    #[serde(rename = "engine-strict")]
    pub engine_strict: bool,
}

impl RegistryConfig {
    /// Read the registry configuration under `package_root`.
    ///
    /// Any failure to read or parse the file is treated as "flag absent",
    /// never as an error.
    pub fn from_package_root(package_root: &Path) -> Self {
        let path = package_root.join(REGISTRY_CONFIG_FILE);
        std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| toml::from_str(&content).ok())
            .unwrap_or_default()
    }
}

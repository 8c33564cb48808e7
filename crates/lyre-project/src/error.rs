//! Error types for package discovery.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the strict manifest parse path.
///
/// Callers that want best-effort discovery use
/// [`PackageManifest::load_or_default`](crate::manifest::PackageManifest::load_or_default),
/// which swallows these and returns empty metadata.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse manifest at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

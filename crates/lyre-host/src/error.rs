//! Fatal host errors raised during loading.

use crate::fault::{FaultHandle, ProgramFault};
use semver::{Version, VersionReq};
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors from the module loader and compiler bridge.
///
/// Everything here funnels through the failure classifier; resolution-time
/// issues never reach this type (they degrade with warnings instead).
#[derive(Debug, Error)]
pub enum HostError {
    #[error("no entrypoint found in {}", .dir.display())]
    EntrypointNotFound { dir: PathBuf },

    #[error("expected entrypoint module to have either a default export or named exports but not both")]
    AmbiguousExport { named: Vec<String> },

    #[error(
        "the current runtime version is incompatible with {}\n\
         expected version: {required} as found in package.toml > engines > runtime\n\
         actual runtime version: {actual}\n\
         to fix, install a runtime version compatible with {required}",
        .package_root.display()
    )]
    Compatibility {
        package_root: PathBuf,
        required: VersionReq,
        actual: Version,
    },

    #[error("compiler configuration path was set to {} but the file was not found", .path.display())]
    MissingCompilerConfig { path: PathBuf },

    #[error("{0}")]
    Load(FaultHandle),
}

impl HostError {
    /// Convert into a fault for the classifier.
    ///
    /// Engine load faults pass through unchanged so their identity is
    /// preserved for deduplication; everything else becomes a generic fault
    /// whose message carries the full formatted error.
    pub fn into_fault(self) -> FaultHandle {
        match self {
            HostError::Load(fault) => fault,
            other => ProgramFault::generic(other.to_string()).into_handle(),
        }
    }
}

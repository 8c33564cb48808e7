//! Lyre Package Discovery
//!
//! This crate resolves a raw program reference into an absolute entrypoint
//! path plus the program's package metadata.
//!
//! # Package Structure
//!
//! ```text
//! my_program/
//! ├── package.toml          # Manifest (optional)
//! ├── .lyrerc               # Registry configuration (optional)
//! └── entry.lyr             # Entrypoint
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use lyre_project::resolve_program;
//!
//! let resolved = resolve_program("entry.lyr", &cwd).await;
//! println!("{}", resolved.program.display());
//! ```
//!
//! Resolution is deliberately forgiving: programs without a manifest, or
//! with a manifest pointing at files that do not exist, still resolve (with
//! a warning) to something the host can attempt to load. Hard failures are
//! the module loader's business, not discovery's.

pub mod error;
pub mod manifest;
pub mod registry;
pub mod resolve;

pub use error::ManifestError;
pub use manifest::{EnginesSection, ExportsField, PackageManifest, MANIFEST_FILE};
pub use registry::{RegistryConfig, REGISTRY_CONFIG_FILE};
pub use resolve::{package_root_from_program_path, resolve_program, ResolvedProgram, NO_ENTRYPOINT};

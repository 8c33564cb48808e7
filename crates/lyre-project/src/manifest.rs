//! Package manifest (package.toml) parsing.

use crate::error::ManifestError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// File name of the package manifest.
pub const MANIFEST_FILE: &str = "package.toml";

/// A parsed package manifest.
///
/// Every field is optional: programs are not required to carry a manifest at
/// all, and discovery degrades to [`PackageManifest::default`] when the file
/// is missing or unparsable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackageManifest {
    /// Package name (informational only).
    pub name: Option<String>,

    /// Declared entrypoint, relative to the package root.
    pub main: Option<String>,

    /// Package entry points; either a bare path or a table of conditions.
    pub exports: Option<ExportsField>,

    /// Module system the package opts into; `"module"` selects declarative
    /// (static) loads, anything else the synchronous system.
    #[serde(rename = "type")]
    pub kind: Option<String>,

    /// Runtime dependencies, name → version range.
    pub dependencies: BTreeMap<String, String>,

    /// Development-only dependencies.
    #[serde(rename = "dev-dependencies")]
    pub dev_dependencies: BTreeMap<String, String>,

    /// Named command lines (e.g. a `build` script).
    pub scripts: BTreeMap<String, String>,

    /// Runtime version requirements.
    pub engines: Option<EnginesSection>,
}

/// The `engines` table of the manifest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EnginesSection {
    /// Required host runtime version range, e.g. `">=0.4.0"`.
    pub runtime: Option<String>,
}

/// The `exports` field: either a bare path or a table of conditions keyed by
/// subpath (`"."`) and condition names (`default`, `require`, `import`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExportsField {
    Path(String),
    Table(BTreeMap<String, ExportsField>),
}

impl ExportsField {
    /// Derive the manifest-declared entrypoint from this field, if any.
    ///
    /// A string export resolves directly. A table export resolves its `"."`
    /// key, then recursively a `default`/`require`/`import` condition until a
    /// path is reached.
    pub fn entry_candidate(&self) -> Option<&str> {
        match self {
            ExportsField::Path(path) => Some(path),
            ExportsField::Table(table) => table.get(".")?.condition_candidate(),
        }
    }

    fn condition_candidate(&self) -> Option<&str> {
        match self {
            ExportsField::Path(path) => Some(path),
            ExportsField::Table(table) => ["default", "require", "import"]
                .iter()
                .find_map(|key| table.get(*key))
                .and_then(ExportsField::condition_candidate),
        }
    }
}

impl PackageManifest {
    /// Parse a manifest from a file path.
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Io {
            path: path.to_owned(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ManifestError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Load the manifest under `package_root`, degrading to empty metadata.
    ///
    /// A missing or unparsable manifest is not an error; discovery is
    /// best-effort by contract.
    pub fn load_or_default(package_root: &Path) -> Self {
        let path = package_root.join(MANIFEST_FILE);
        match Self::from_file(&path) {
            Ok(manifest) => manifest,
            Err(e) => {
                debug!("no usable manifest at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Whether the package opts into the static (declarative) module system.
    pub fn uses_static_modules(&self) -> bool {
        self.kind.as_deref() == Some("module")
    }

    /// The entrypoint declared by the manifest, in `exports`-then-`main`
    /// priority order.
    pub fn declared_entrypoint(&self) -> Option<&str> {
        self.exports
            .as_ref()
            .and_then(ExportsField::entry_candidate)
            .or(self.main.as_deref())
    }
}

//! Program path and package root resolution.
//!
//! Turns a raw program reference into an absolute entrypoint path plus the
//! discovered package metadata. Every step here degrades gracefully: a
//! missing manifest, a missing declared entrypoint, or an unreadable
//! directory all fall back to defaults with at most a warning. Resolution
//! never fails.

use crate::manifest::{PackageManifest, MANIFEST_FILE};
use std::path::{Path, PathBuf};
use tracing::warn;

/// The positional reference meaning "no explicit entrypoint was supplied".
pub const NO_ENTRYPOINT: &str = ".";

/// A resolved program reference.
#[derive(Debug)]
pub struct ResolvedProgram {
    /// Absolute path to the program entrypoint.
    pub program: PathBuf,

    /// Directory the package manifest was found in, or the enclosing
    /// directory of the program when no manifest exists.
    pub package_root: PathBuf,

    /// Discovered package metadata; empty when no manifest exists.
    pub manifest: PackageManifest,
}

/// Resolve a raw program reference against a working directory.
///
/// The reference is made absolute and the package root is discovered by
/// walking upward until a `package.toml` is found. When the reference is the
/// [`NO_ENTRYPOINT`] sentinel, an entrypoint is derived from the manifest's
/// `exports` or `main` declarations.
pub async fn resolve_program(reference: &str, cwd: &Path) -> ResolvedProgram {
    let has_entrypoint = reference != NO_ENTRYPOINT;

    let raw = Path::new(reference);
    let mut program = if raw.is_absolute() {
        raw.to_owned()
    } else {
        cwd.join(raw)
    };

    let package_root = package_root_from_program_path(&program).await;
    let manifest = PackageManifest::load_or_default(&package_root);

    // Without an explicit entrypoint, prefer what the manifest declares.
    if !has_entrypoint {
        if let Some(declared) = manifest.declared_entrypoint() {
            program = resolve_entrypoint(&package_root, declared, program).await;
        }
    }

    ResolvedProgram {
        program,
        package_root,
        manifest,
    }
}

/// Search upward from the program path for the directory containing
/// `package.toml`.
///
/// When the program path is not itself a directory (or does not exist), the
/// walk starts from its parent. When no manifest is found anywhere up the
/// tree, the original enclosing directory is returned with a warning; this
/// step never fails.
pub async fn package_root_from_program_path(program: &Path) -> PathBuf {
    let is_directory = match tokio::fs::metadata(program).await {
        Ok(meta) => meta.is_dir(),
        // The program path doesn't exist; treat it as a file path.
        Err(_) => false,
    };
    let program_dir = if is_directory {
        program.to_owned()
    } else {
        program.parent().map(Path::to_owned).unwrap_or_default()
    };

    let mut dir = program_dir.clone();
    loop {
        if tokio::fs::try_exists(dir.join(MANIFEST_FILE))
            .await
            .unwrap_or(false)
        {
            return dir;
        }
        match dir.parent() {
            Some(parent) => dir = parent.to_owned(),
            None => break,
        }
    }

    warn!(
        "could not find a {} file for the program; using the program directory as the package root",
        MANIFEST_FILE
    );
    program_dir
}

/// Existence-check a manifest-declared entrypoint.
///
/// Returns the candidate joined to the package root when it exists on disk;
/// otherwise warns once and keeps the fallback unchanged.
async fn resolve_entrypoint(package_root: &Path, entrypoint: &str, fallback: PathBuf) -> PathBuf {
    let candidate = package_root.join(entrypoint);
    if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        candidate
    } else {
        warn!(
            "could not find entry point '{}' declared in {}; using '{}' instead",
            entrypoint,
            MANIFEST_FILE,
            fallback.display()
        );
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn package_root_found_at_program_directory() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(dir.path().join(MANIFEST_FILE), "name = \"p\"").expect("write manifest");
        fs::write(dir.path().join("main.lyr"), "").expect("write program");

        let root = package_root_from_program_path(&dir.path().join("main.lyr")).await;
        assert_eq!(root, dir.path());
    }

    #[tokio::test]
    async fn package_root_found_by_upward_walk() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let nested = dir.path().join("src/deep");
        fs::create_dir_all(&nested).expect("create nested dirs");
        fs::write(dir.path().join(MANIFEST_FILE), "name = \"p\"").expect("write manifest");
        fs::write(nested.join("main.lyr"), "").expect("write program");

        let root = package_root_from_program_path(&nested.join("main.lyr")).await;
        assert_eq!(root, dir.path());
    }

    #[tokio::test]
    async fn missing_manifest_falls_back_to_program_directory() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(dir.path().join("main.lyr"), "").expect("write program");

        let root = package_root_from_program_path(&dir.path().join("main.lyr")).await;
        assert_eq!(root, dir.path());
    }

    #[tokio::test]
    async fn nonexistent_program_path_walks_from_parent() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(dir.path().join(MANIFEST_FILE), "name = \"p\"").expect("write manifest");

        let root = package_root_from_program_path(&dir.path().join("missing.lyr")).await;
        assert_eq!(root, dir.path());
    }

    #[tokio::test]
    async fn sentinel_derives_entrypoint_from_main() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(dir.path().join(MANIFEST_FILE), "main = \"entry.lyr\"")
            .expect("write manifest");
        fs::write(dir.path().join("entry.lyr"), "").expect("write entry");

        let resolved = resolve_program(NO_ENTRYPOINT, dir.path()).await;
        assert_eq!(resolved.program, dir.path().join("entry.lyr"));
        assert_eq!(resolved.package_root, dir.path());
    }

    #[tokio::test]
    async fn sentinel_prefers_exports_over_main() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(
            dir.path().join(MANIFEST_FILE),
            "main = \"entry.lyr\"\nexports = \"exported.lyr\"",
        )
        .expect("write manifest");
        fs::write(dir.path().join("entry.lyr"), "").expect("write entry");
        fs::write(dir.path().join("exported.lyr"), "").expect("write exported");

        let resolved = resolve_program(NO_ENTRYPOINT, dir.path()).await;
        assert_eq!(resolved.program, dir.path().join("exported.lyr"));
    }

    #[tokio::test]
    async fn missing_declared_entrypoint_keeps_original_reference() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(dir.path().join(MANIFEST_FILE), "main = \"not-there.lyr\"")
            .expect("write manifest");

        let resolved = resolve_program(NO_ENTRYPOINT, dir.path()).await;
        // The declared entrypoint does not exist, so the sentinel resolves to
        // the working directory itself.
        assert_eq!(resolved.program, dir.path().join(NO_ENTRYPOINT));
    }

    #[tokio::test]
    async fn explicit_entrypoint_is_not_overridden_by_manifest() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(dir.path().join(MANIFEST_FILE), "main = \"entry.lyr\"")
            .expect("write manifest");
        fs::write(dir.path().join("entry.lyr"), "").expect("write entry");
        fs::write(dir.path().join("other.lyr"), "").expect("write other");

        let resolved = resolve_program("other.lyr", dir.path()).await;
        assert_eq!(resolved.program, dir.path().join("other.lyr"));
    }

    #[tokio::test]
    async fn relative_reference_is_made_absolute() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(dir.path().join("main.lyr"), "").expect("write program");

        let resolved = resolve_program("main.lyr", dir.path()).await;
        assert!(resolved.program.is_absolute());
        assert_eq!(resolved.program, dir.path().join("main.lyr"));
    }
}

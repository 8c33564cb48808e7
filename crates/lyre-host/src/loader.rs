//! Module loading and execution.
//!
//! The loader runs the resolved entrypoint under exactly one of the two
//! module systems, normalizes the exported shape, and owns the two
//! load-time diagnostics: the compiled-sibling warning and the enhanced
//! module-not-found diagnosis.

use crate::engine::Engine;
use crate::error::HostError;
use crate::export::ExportedValue;
use crate::fault::FaultHandle;
use crate::invocation::{ModuleSystem, ProgramInvocation};
use crate::trace::ExecutionTracer;
use lyre_project::{PackageManifest, RegistryConfig};
use semver::{Version, VersionReq};
use std::path::{Path, MAIN_SEPARATOR};
use tracing::{debug, error, warn};

/// Conventional index filenames probed, in order, for a directory entrypoint
/// under the static module system.
pub const INDEX_CANDIDATES: [&str; 4] = ["index.lyr", "index.mlyr", "index.lyt", "index.mlyt"];

/// The message prefix engines use for unresolvable modules.
pub const MISSING_MODULE_PREFIX: &str = "cannot find module '";

/// Decide the module system for the whole run from the manifest's `type`
/// field.
pub fn module_system_for(manifest: &PackageManifest) -> ModuleSystem {
    if manifest.uses_static_modules() {
        ModuleSystem::Static
    } else {
        ModuleSystem::Synchronous
    }
}

/// Load the program's export under the invocation's module system.
pub async fn load_program(
    engine: &mut dyn Engine,
    invocation: &ProgramInvocation,
) -> Result<ExportedValue, HostError> {
    match invocation.module_system {
        ModuleSystem::Synchronous => load_synchronous(engine, &invocation.resolved_path).await,
        ModuleSystem::Static => load_static(engine, &invocation.resolved_path).await,
    }
}

/// Synchronous path: eager load through the classic module system.
async fn load_synchronous(
    engine: &mut dyn Engine,
    program: &Path,
) -> Result<ExportedValue, HostError> {
    let is_dir = tokio::fs::metadata(program)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);

    // A directory reference must end with a separator so the engine loads
    // the directory itself, not a sibling data file of the same base name.
    let mut reference = program.display().to_string();
    if is_dir && !reference.ends_with(MAIN_SEPARATOR) {
        reference.push(MAIN_SEPARATOR);
    }

    engine.load_sync(&reference).map_err(HostError::Load)
}

/// Static path: resolve the real file, probe directory indexes, load
/// asynchronously, and enforce the default-only export rule.
async fn load_static(engine: &mut dyn Engine, program: &Path) -> Result<ExportedValue, HostError> {
    let real = tokio::fs::canonicalize(program)
        .await
        .unwrap_or_else(|_| program.to_owned());

    let is_dir = tokio::fs::metadata(&real)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);

    let main_path = if is_dir {
        let mut found = None;
        for candidate in INDEX_CANDIDATES {
            let path = real.join(candidate);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                found = Some(path);
                break;
            }
        }
        found.ok_or(HostError::EntrypointNotFound { dir: real.clone() })?
    } else {
        real
    };

    let mut namespace = engine.load_static(&main_path).await.map_err(HostError::Load)?;

    // A `default` binding must be the namespace's only binding; this is
    // checked before the program's result is awaited.
    match namespace.remove_default() {
        Some(default) if namespace.is_empty() => Ok(default),
        Some(_) => Err(HostError::AmbiguousExport {
            named: namespace.binding_names(),
        }),
        None => Ok(ExportedValue::Namespace(namespace)),
    }
}

/// Warn when a program directory carries both a compiled and a source index
/// of the same base name: the compiled file is what was actually loaded.
pub async fn warn_on_compiled_and_source_siblings(program: &Path) {
    let is_dir = tokio::fs::metadata(program)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return;
    }

    let compiled = tokio::fs::try_exists(program.join("index.lyr"))
        .await
        .unwrap_or(false);
    let source = tokio::fs::try_exists(program.join("index.lyt"))
        .await
        .unwrap_or(false);
    if compiled && source {
        warn!(
            "found a typed-dialect program directory containing an index.lyr file and no \
             explicit entrypoint - the runtime will use index.lyr"
        );
    }
}

/// Enforce the manifest's runtime version range when the registry
/// configuration asks for strict engines.
///
/// Failures to read or parse `.lyrerc` (or the range itself) are treated as
/// "flag absent"; a declared, parseable range that the actual version does
/// not satisfy is fatal, before any user code runs.
pub fn check_engine_compatibility(
    tracer: &ExecutionTracer,
    package_root: &Path,
    manifest: &PackageManifest,
    actual: &Version,
) -> Result<(), HostError> {
    let mut span = tracer.new_span("lyre-runtime.reading-registry-config");
    let registry = RegistryConfig::from_package_root(package_root);
    span.end();

    if !registry.engine_strict {
        return Ok(());
    }
    let Some(range) = manifest.engines.as_ref().and_then(|e| e.runtime.as_deref()) else {
        return Ok(());
    };
    let required = match VersionReq::parse(range) {
        Ok(required) => required,
        Err(e) => {
            debug!("ignoring unparsable engines.runtime range '{range}': {e}");
            return Ok(());
        }
    };

    if required.matches(actual) {
        Ok(())
    } else {
        Err(HostError::Compatibility {
            package_root: package_root.to_owned(),
            required,
            actual: actual.clone(),
        })
    }
}

/// Extract the module name from an engine "cannot find module" message.
pub fn missing_module_name(message: &str) -> Option<&str> {
    let start = message.find(MISSING_MODULE_PREFIX)? + MISSING_MODULE_PREFIX.len();
    let end = message[start..].find('\'')?;
    Some(&message[start..start + end])
}

/// Attempt an enhanced diagnosis for a module load failure.
///
/// Returns true when a user-actionable message was printed (the run should
/// finish with the diagnostic exit sentinel), false when the fault is not a
/// top-level module-not-found and must be rethrown verbatim.
pub async fn diagnose_load_failure(program: &Path, fault: &FaultHandle) -> bool {
    let Some(name) = missing_module_name(fault.message()) else {
        return false;
    };

    // Only the top-level program gets enhanced diagnosis; any other missing
    // module is a dependency of user code, not the entrypoint itself.
    let program_ref = program.display().to_string();
    if name.trim_end_matches(MAIN_SEPARATOR) != program_ref.trim_end_matches(MAIN_SEPARATOR) {
        return false;
    }

    error!(
        "we failed to locate the entry point for your program: {}",
        program.display()
    );

    // Inspect the package for the most specific explanation we can offer,
    // from most to least specific.
    let package_root = lyre_project::package_root_from_program_path(program).await;
    let manifest = PackageManifest::load_or_default(&package_root);

    error!("here's what we think went wrong:");

    if let Some(command) = manifest.scripts.get("build") {
        error!(
            "  * your program looks like it has a build script associated with it ('{command}')"
        );
        error!(
            "the runtime does not run build scripts before running your program; \
             run '{command}' and try again"
        );
        return true;
    }

    if manifest.dependencies.contains_key("lyt") || manifest.dev_dependencies.contains_key("lyt") {
        error!("  * your program looks like a Lyt program. have you run 'lytc'?");
        return true;
    }

    let main = manifest.main.as_deref().unwrap_or("index.lyr");
    let main_file = package_root.join(main);
    if !tokio::fs::try_exists(&main_file).await.unwrap_or(false) {
        error!(
            "  * your program's 'main' file ({}) does not exist",
            main_file.display()
        );
        return true;
    }

    error!("  * the runtime encountered an unexpected error");
    error!("    raw exception message: {}", fault.message());
    true
}

//! Invocation state: arguments, environment flags, and the resolved program.

use lyre_project::PackageManifest;
use semver::Version;
use std::path::PathBuf;

/// Exit status used when a load diagnostic has already been printed to the
/// user, telling the orchestrator not to report any further issues.
pub const EXIT_AFTER_DIAGNOSTIC: i32 = 32;

/// Environment flag selecting typed-dialect (Lyt) mode.
pub const ENV_TYPED: &str = "LYRE_TYPED";
/// Environment override for the compiler configuration file path.
pub const ENV_COMPILER_CONFIG: &str = "LYRE_LYT_CONFIG";
/// Environment override for the compiler's type-check mode.
pub const ENV_TRANSPILE_ONLY: &str = "LYRE_TRANSPILE_ONLY";
/// Experimental-features opt-in; tracing requires it.
pub const ENV_EXPERIMENTAL: &str = "LYRE_EXPERIMENTAL";

/// The argument set the orchestrator hands to [`run`](crate::run::run).
#[derive(Debug, Default)]
pub struct RunArgs {
    /// `[program_reference, ...program_args]`. The reference may be the
    /// `"."` sentinel, meaning "derive the entrypoint from the manifest".
    pub positional: Vec<String>,

    /// Tracing destination endpoint. `None` covers both "absent" and the
    /// boolean `false` form of the flag.
    pub tracing: Option<String>,

    /// Directory to switch to before resolving the program.
    pub pwd: Option<PathBuf>,
}

/// Environment flags, read once at startup and passed explicitly from there.
#[derive(Debug, Clone, Default)]
pub struct HostEnv {
    /// The program uses the typed-source dialect.
    pub typed: bool,

    /// Compiler configuration path override.
    pub compiler_config: Option<PathBuf>,

    /// Explicit type-check override: `Some(true)` forces transpile-only,
    /// `Some(false)` forces checking, `None` defers to project options.
    pub transpile_only: Option<bool>,

    /// Experimental features opt-in.
    pub experimental: bool,
}

impl HostEnv {
    /// Capture the host environment flags.
    pub fn from_env() -> Self {
        Self {
            typed: std::env::var(ENV_TYPED).map(|v| v == "true").unwrap_or(false),
            compiler_config: std::env::var(ENV_COMPILER_CONFIG).ok().map(PathBuf::from),
            transpile_only: std::env::var(ENV_TRANSPILE_ONLY)
                .ok()
                .filter(|v| !v.is_empty())
                .map(|v| v == "true"),
            experimental: std::env::var(ENV_EXPERIMENTAL)
                .map(|v| !v.is_empty())
                .unwrap_or(false),
        }
    }
}

/// The module-loading model governing the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleSystem {
    /// Classic eager, circular-safe loads.
    Synchronous,
    /// Declarative, asynchronous loads.
    Static,
}

/// The compiler strategy decided before any user code runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    /// Typed-dialect mode is off.
    None,
    /// Compile without type checking.
    TranspileOnly,
    /// Compile with full type checking.
    TypeChecked,
}

/// One program invocation. Fields are resolved in sequence during startup
/// and immutable afterwards.
#[derive(Debug)]
pub struct ProgramInvocation {
    /// The reference as given on the command line.
    pub raw_reference: String,

    /// Absolute path to the entrypoint.
    pub resolved_path: PathBuf,

    /// Directory of the package manifest (or the enclosing directory).
    pub package_root: PathBuf,

    /// Discovered package metadata.
    pub manifest: PackageManifest,

    /// The module system governing the load.
    pub module_system: ModuleSystem,

    /// The compiler strategy for the run.
    pub compile_mode: CompileMode,
}

/// The actual version of this host runtime, for the engines gate.
pub fn host_runtime_version() -> Version {
    Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(0, 0, 0))
}

//! Compiler bridge: one-shot activation of the Lyt dialect compiler.
//!
//! Active only when the environment declares the program uses the typed
//! dialect. The bridge merges compiler configuration, decides the type-check
//! mode, and picks exactly one registration strategy before any user module
//! is imported. Both decisions are irreversible for the invocation.

use crate::engine::{Engine, LoadHook, RegistrationStrategy};
use crate::invocation::{CompileMode, HostEnv};
use lyre_project::PackageManifest;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default compiler configuration file, relative to the working directory.
pub const DEFAULT_COMPILER_CONFIG_FILE: &str = "lytconfig.toml";

/// Source-file extensions of the typed dialect.
pub const TYPED_EXTENSIONS: [&str; 2] = ["lyt", "mlyt"];

/// Type-check mode for the dialect compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCheckMode {
    /// Full type checking (the default).
    Checked,
    /// Compile without checking; users with a separate check step skip the
    /// cost of checking twice.
    TranspileOnly,
}

/// Compiler options as declared in the project's configuration file.
///
/// Parsing is best-effort; unknown keys are ignored and an unreadable file
/// behaves like an empty one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Project opted out of type checking.
    pub no_check: bool,

    /// Emit target.
    pub target: Option<String>,

    /// Module output form.
    pub module: Option<String>,

    /// Emit source maps.
    pub source_map: Option<bool>,
}

impl CompilerOptions {
    /// Best-effort read of a configuration file.
    fn from_file(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| toml::from_str(&content).ok())
            .unwrap_or_default()
    }

    /// Overlay project-declared options onto built-in defaults. The project
    /// wins on every field it sets.
    fn merged_over(self, defaults: CompilerOptions) -> CompilerOptions {
        CompilerOptions {
            no_check: self.no_check || defaults.no_check,
            target: self.target.or(defaults.target),
            module: self.module.or(defaults.module),
            source_map: self.source_map.or(defaults.source_map),
        }
    }
}

/// The merged configuration a registered load hook compiles with.
#[derive(Debug, Clone)]
pub struct CompilerConfiguration {
    /// The configuration file the compiler should read project options from.
    pub project: PathBuf,

    /// Skip whole-project option discovery (no configuration file present).
    pub skip_project: bool,

    /// Type-check mode.
    pub type_check: TypeCheckMode,

    /// Merged compiler options.
    pub options: CompilerOptions,
}

/// Outcome of bridge activation, recorded on the invocation.
#[derive(Debug)]
pub struct BridgeActivation {
    /// The compile mode for the invocation record.
    pub compile_mode: CompileMode,

    /// The registered strategy, when typed-dialect mode is active.
    pub strategy: Option<RegistrationStrategy>,

    /// Set when the configuration path was explicitly overridden but the
    /// file does not exist. The run raises a fatal fault for this after
    /// `program_started` has fired.
    pub missing_config_override: Option<PathBuf>,
}

impl BridgeActivation {
    fn inactive() -> Self {
        Self {
            compile_mode: CompileMode::None,
            strategy: None,
            missing_config_override: None,
        }
    }
}

/// Built-in compiler defaults for the static (declarative) strategy.
fn static_defaults() -> CompilerOptions {
    CompilerOptions {
        no_check: false,
        target: Some("lyre2024".to_string()),
        module: Some("declarative".to_string()),
        source_map: Some(true),
    }
}

/// Built-in compiler defaults for the bridge strategy.
fn bridge_defaults() -> CompilerOptions {
    CompilerOptions {
        no_check: false,
        target: Some("lyre2020".to_string()),
        module: Some("synchronous".to_string()),
        source_map: Some(true),
    }
}

/// Activate the compiler bridge for this invocation.
///
/// Reads the compiler configuration path (overridable through the
/// environment), determines the type-check mode, chooses the registration
/// strategy, and registers the load hook on the engine. A missing
/// configuration file or declarative extension never raises: the bridge
/// degrades to project-less options and the bridge strategy.
pub fn activate(
    engine: &mut dyn Engine,
    manifest: &PackageManifest,
    env: &HostEnv,
    cwd: &Path,
) -> BridgeActivation {
    if !env.typed {
        return BridgeActivation::inactive();
    }

    let overridden = env.compiler_config.is_some();
    let config_path = env
        .compiler_config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_COMPILER_CONFIG_FILE));
    let config_path = if config_path.is_absolute() {
        config_path
    } else {
        cwd.join(config_path)
    };

    // Without a configuration file the compiler skips whole-project option
    // discovery; sensible defaults make the file optional.
    let skip_project = !config_path.exists();
    let missing_config_override = (skip_project && overridden).then(|| config_path.clone());

    let project_options = if skip_project {
        CompilerOptions::default()
    } else {
        CompilerOptions::from_file(&config_path)
    };

    // Type-check mode precedence: explicit environment override, then the
    // project's no_check option, then checked.
    let type_check = match env.transpile_only {
        Some(true) => TypeCheckMode::TranspileOnly,
        Some(false) => TypeCheckMode::Checked,
        None if project_options.no_check => TypeCheckMode::TranspileOnly,
        None => TypeCheckMode::Checked,
    };

    // The static strategy needs every one of: a static-module package, a
    // compiler with the declarative target, no other loader hook active, and
    // the declarative extension present. Anything missing falls back to the
    // bridge strategy.
    let compiler = engine.typed_compiler();
    let static_capable = manifest.uses_static_modules()
        && !engine.has_load_hook()
        && compiler
            .as_ref()
            .map(|c| c.supports_declarative_target() && c.has_static_extension())
            .unwrap_or(false);

    let (strategy, options) = if static_capable {
        debug!("using automatic declarative mode");
        (
            RegistrationStrategy::Static,
            project_options.merged_over(static_defaults()),
        )
    } else {
        (
            RegistrationStrategy::Bridge,
            project_options.merged_over(bridge_defaults()),
        )
    };

    engine.register_load_hook(LoadHook {
        extensions: TYPED_EXTENSIONS.to_vec(),
        strategy,
        config: CompilerConfiguration {
            project: config_path,
            skip_project,
            type_check,
            options,
        },
    });

    let compile_mode = match type_check {
        TypeCheckMode::Checked => CompileMode::TypeChecked,
        TypeCheckMode::TranspileOnly => CompileMode::TranspileOnly,
    };

    BridgeActivation {
        compile_mode,
        strategy: Some(strategy),
        missing_config_override,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{FaultChannels, TypedCompiler};
    use crate::export::{ExportedValue, Namespace};
    use crate::fault::FaultHandle;
    use futures::future::LocalBoxFuture;
    use futures::FutureExt;
    use semver::Version;
    use std::sync::Arc;

    struct StubCompiler {
        version: Version,
        static_extension: bool,
    }

    impl TypedCompiler for StubCompiler {
        fn version(&self) -> Version {
            self.version.clone()
        }

        fn has_static_extension(&self) -> bool {
            self.static_extension
        }
    }

    /// Records what the bridge registered.
    #[derive(Default)]
    struct StubEngine {
        compiler: Option<Arc<StubCompiler>>,
        existing_hook: bool,
        registered: Option<LoadHook>,
    }

    impl Engine for StubEngine {
        fn load_sync(&mut self, _reference: &str) -> Result<ExportedValue, FaultHandle> {
            Ok(ExportedValue::empty())
        }

        fn load_static<'a>(
            &'a mut self,
            _path: &'a Path,
        ) -> LocalBoxFuture<'a, Result<Namespace, FaultHandle>> {
            async { Ok(Namespace::new()) }.boxed_local()
        }

        fn has_load_hook(&self) -> bool {
            self.existing_hook
        }

        fn register_load_hook(&mut self, hook: LoadHook) {
            self.registered = Some(hook);
        }

        fn typed_compiler(&self) -> Option<Arc<dyn TypedCompiler>> {
            self.compiler
                .clone()
                .map(|c| c as Arc<dyn TypedCompiler>)
        }

        fn install_fault_channels(&mut self, _channels: FaultChannels) {}

        fn set_program_args(&mut self, _args: &[String]) {}
    }

    fn modern_compiler() -> Option<Arc<StubCompiler>> {
        Some(Arc::new(StubCompiler {
            version: Version::new(2, 3, 0),
            static_extension: true,
        }))
    }

    fn static_manifest() -> PackageManifest {
        toml::from_str(r#"type = "module""#).unwrap()
    }

    fn cwd() -> tempfile::TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    #[test]
    fn inactive_without_typed_flag() {
        let mut engine = StubEngine::default();
        let activation = activate(
            &mut engine,
            &PackageManifest::default(),
            &HostEnv::default(),
            cwd().path(),
        );

        assert_eq!(activation.compile_mode, CompileMode::None);
        assert!(activation.strategy.is_none());
        assert!(engine.registered.is_none());
    }

    #[test]
    fn static_strategy_when_all_conditions_hold() {
        let mut engine = StubEngine {
            compiler: modern_compiler(),
            ..Default::default()
        };
        let env = HostEnv {
            typed: true,
            ..Default::default()
        };

        let activation = activate(&mut engine, &static_manifest(), &env, cwd().path());

        assert_eq!(activation.strategy, Some(RegistrationStrategy::Static));
        let hook = engine.registered.expect("hook registered");
        assert_eq!(hook.strategy, RegistrationStrategy::Static);
        assert_eq!(hook.config.options.module.as_deref(), Some("declarative"));
        assert!(hook.config.skip_project);
    }

    #[test]
    fn bridge_strategy_for_synchronous_package() {
        let mut engine = StubEngine {
            compiler: modern_compiler(),
            ..Default::default()
        };
        let env = HostEnv {
            typed: true,
            ..Default::default()
        };

        let activation = activate(&mut engine, &PackageManifest::default(), &env, cwd().path());
        assert_eq!(activation.strategy, Some(RegistrationStrategy::Bridge));
    }

    #[test]
    fn bridge_strategy_when_extension_is_unavailable() {
        let mut engine = StubEngine {
            compiler: Some(Arc::new(StubCompiler {
                version: Version::new(2, 3, 0),
                static_extension: false,
            })),
            ..Default::default()
        };
        let env = HostEnv {
            typed: true,
            ..Default::default()
        };

        let activation = activate(&mut engine, &static_manifest(), &env, cwd().path());
        assert_eq!(activation.strategy, Some(RegistrationStrategy::Bridge));
    }

    #[test]
    fn bridge_strategy_for_old_compiler() {
        let mut engine = StubEngine {
            compiler: Some(Arc::new(StubCompiler {
                version: Version::new(1, 9, 0),
                static_extension: true,
            })),
            ..Default::default()
        };
        let env = HostEnv {
            typed: true,
            ..Default::default()
        };

        let activation = activate(&mut engine, &static_manifest(), &env, cwd().path());
        assert_eq!(activation.strategy, Some(RegistrationStrategy::Bridge));
    }

    #[test]
    fn bridge_strategy_when_another_hook_is_active() {
        let mut engine = StubEngine {
            compiler: modern_compiler(),
            existing_hook: true,
            ..Default::default()
        };
        let env = HostEnv {
            typed: true,
            ..Default::default()
        };

        let activation = activate(&mut engine, &static_manifest(), &env, cwd().path());
        assert_eq!(activation.strategy, Some(RegistrationStrategy::Bridge));
    }

    #[test]
    fn env_override_forces_transpile_only() {
        let mut engine = StubEngine {
            compiler: modern_compiler(),
            ..Default::default()
        };
        let env = HostEnv {
            typed: true,
            transpile_only: Some(true),
            ..Default::default()
        };

        let activation = activate(&mut engine, &PackageManifest::default(), &env, cwd().path());
        assert_eq!(activation.compile_mode, CompileMode::TranspileOnly);
    }

    #[test]
    fn project_no_check_selects_transpile_only() {
        let dir = cwd();
        std::fs::write(dir.path().join(DEFAULT_COMPILER_CONFIG_FILE), "no_check = true")
            .expect("write config");
        let mut engine = StubEngine {
            compiler: modern_compiler(),
            ..Default::default()
        };
        let env = HostEnv {
            typed: true,
            ..Default::default()
        };

        let activation = activate(&mut engine, &PackageManifest::default(), &env, dir.path());
        assert_eq!(activation.compile_mode, CompileMode::TranspileOnly);
        let hook = engine.registered.expect("hook registered");
        assert!(!hook.config.skip_project);
    }

    #[test]
    fn env_override_beats_project_no_check() {
        let dir = cwd();
        std::fs::write(dir.path().join(DEFAULT_COMPILER_CONFIG_FILE), "no_check = true")
            .expect("write config");
        let mut engine = StubEngine {
            compiler: modern_compiler(),
            ..Default::default()
        };
        let env = HostEnv {
            typed: true,
            transpile_only: Some(false),
            ..Default::default()
        };

        let activation = activate(&mut engine, &PackageManifest::default(), &env, dir.path());
        assert_eq!(activation.compile_mode, CompileMode::TypeChecked);
    }

    #[test]
    fn project_options_override_defaults() {
        let dir = cwd();
        std::fs::write(
            dir.path().join(DEFAULT_COMPILER_CONFIG_FILE),
            r#"target = "lyre2030""#,
        )
        .expect("write config");
        let mut engine = StubEngine {
            compiler: modern_compiler(),
            ..Default::default()
        };
        let env = HostEnv {
            typed: true,
            ..Default::default()
        };

        activate(&mut engine, &PackageManifest::default(), &env, dir.path());
        let hook = engine.registered.expect("hook registered");
        assert_eq!(hook.config.options.target.as_deref(), Some("lyre2030"));
        // Defaults still fill the fields the project left unset.
        assert_eq!(hook.config.options.module.as_deref(), Some("synchronous"));
    }

    #[test]
    fn missing_override_is_flagged_but_still_registers() {
        let dir = cwd();
        let mut engine = StubEngine {
            compiler: modern_compiler(),
            ..Default::default()
        };
        let env = HostEnv {
            typed: true,
            compiler_config: Some(PathBuf::from("custom-lyt.toml")),
            ..Default::default()
        };

        let activation = activate(&mut engine, &PackageManifest::default(), &env, dir.path());
        assert_eq!(
            activation.missing_config_override,
            Some(dir.path().join("custom-lyt.toml"))
        );
        assert!(engine.registered.is_some());
    }
}

//! Lyre Runtime
//!
//! Umbrella crate for the Lyre language runtime: package discovery
//! ([`lyre_project`]) and the program execution host ([`lyre_host`]).
//!
//! The orchestrating engine drives this through [`lyre_host::run`], passing
//! the parsed argument set, its callback hooks, and the platform engine.

pub use lyre_host as host;
pub use lyre_project as project;

// Re-export the main entry points at the crate root.
pub use lyre_host::{
    run, DirectExecution, Engine, ExecutionWrapper, HostEnv, HostEvents, RunArgs, RunOutcome,
    EXIT_AFTER_DIAGNOSTIC,
};
pub use lyre_project::{resolve_program, PackageManifest, ResolvedProgram};

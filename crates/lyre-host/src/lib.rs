//! Lyre Program Execution Host
//!
//! Given a reference to a user-authored deployment program, this crate
//! resolves the concrete entrypoint, optionally bridges the typed Lyt
//! dialect through the in-process compiler, loads the program through the
//! correct module system, executes it, and classifies any fault for the
//! driving orchestrator.
//!
//! # Architecture
//!
//! ```text
//! RunArgs ──► resolve ──► bridge ──► load ──► settle ──► classify
//!               │            │         │                    │
//!        lyre-project     compiler   engine            orchestrator
//!                          hooks     (trait)            callbacks
//! ```
//!
//! Two constraints shape everything here: the two module-loading models are
//! mutually exclusive and decided once per run, and fault reporting must be
//! at-most-once across two independent failure channels.
//!
//! # Quick Start
//!
//! ```ignore
//! use lyre_host::{run, DirectExecution, HostEnv, RunArgs};
//!
//! let outcome = run(args, HostEnv::from_env(), &mut engine, &events, &DirectExecution).await;
//! ```

pub mod bridge;
pub mod classify;
pub mod context;
pub mod engine;
pub mod error;
pub mod export;
pub mod fault;
pub mod invocation;
pub mod loader;
pub mod names;
pub mod run;
pub mod trace;

pub use classify::{FaultClassifier, ReportedErrorSet};
pub use context::{HostContext, HostEvents};
pub use engine::{
    fault_channels, Engine, FaultChannels, FaultReceivers, LoadHook, RegistrationStrategy,
    TypedCompiler,
};
pub use error::HostError;
pub use export::{Eventual, ExportedValue, Namespace, ProgramBody, ProgramResult};
pub use fault::{
    default_error_message, fault_identity, FaultHandle, FaultIdentity, FaultKind, ProgramFault,
};
pub use invocation::{
    host_runtime_version, CompileMode, HostEnv, ModuleSystem, ProgramInvocation, RunArgs,
    EXIT_AFTER_DIAGNOSTIC,
};
pub use names::{is_legal_function_name, is_legal_member_name};
pub use run::{run, DirectExecution, ExecutionWrapper, RunOutcome};
pub use trace::{tracing_enabled, ExecutionTracer, RemoteCallInstrumentation, Span};

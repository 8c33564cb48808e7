//! The seam between the host and the platform engine that evaluates Lyre
//! modules.
//!
//! The engine is an external collaborator: it owns module evaluation, the
//! typed-dialect compiler (when bundled), and the two process-wide fault
//! channels. The host drives it through [`Engine`] and never touches process
//! globals itself.

use crate::bridge::CompilerConfiguration;
use crate::export::{ExportedValue, Namespace};
use crate::fault::FaultHandle;
use crate::trace::RemoteCallInstrumentation;
use futures::future::LocalBoxFuture;
use semver::Version;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

/// The two mutually exclusive registration strategies for the typed-dialect
/// compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStrategy {
    /// Load-time hook for declarative module loads.
    Static,
    /// Synchronous compile-then-execute interceptor.
    Bridge,
}

/// A load-time compilation hook, registered once before any user module is
/// imported.
#[derive(Debug)]
pub struct LoadHook {
    /// Source-file extensions the hook intercepts.
    pub extensions: Vec<&'static str>,

    /// The chosen registration strategy.
    pub strategy: RegistrationStrategy,

    /// The merged compiler configuration the hook compiles with.
    pub config: CompilerConfiguration,
}

/// Senders for the two process-wide fault channels, handed to the engine at
/// installation time.
#[derive(Debug, Clone)]
pub struct FaultChannels {
    /// Synchronous uncaught faults.
    pub uncaught: mpsc::UnboundedSender<FaultHandle>,
    /// Asynchronous unhandled rejected deferred values.
    pub unhandled: mpsc::UnboundedSender<FaultHandle>,
}

/// Receiver ends of the fault channels, drained by the host.
#[derive(Debug)]
pub struct FaultReceivers {
    pub uncaught: mpsc::UnboundedReceiver<FaultHandle>,
    pub unhandled: mpsc::UnboundedReceiver<FaultHandle>,
}

/// Create a connected pair of fault channel ends.
pub fn fault_channels() -> (FaultChannels, FaultReceivers) {
    let (uncaught_tx, uncaught_rx) = mpsc::unbounded_channel();
    let (unhandled_tx, unhandled_rx) = mpsc::unbounded_channel();
    (
        FaultChannels {
            uncaught: uncaught_tx,
            unhandled: unhandled_tx,
        },
        FaultReceivers {
            uncaught: uncaught_rx,
            unhandled: unhandled_rx,
        },
    )
}

/// The typed-dialect (Lyt) compiler, when the engine bundles one.
pub trait TypedCompiler {
    /// Compiler version.
    fn version(&self) -> Version;

    /// Whether the modern declarative module target is supported.
    ///
    /// Defaults to a version gate: declarative output landed in 2.1.0.
    fn supports_declarative_target(&self) -> bool {
        self.version() >= Version::new(2, 1, 0)
    }

    /// Whether the declarative-module loader extension can be located.
    fn has_static_extension(&self) -> bool;
}

/// The platform engine executing Lyre programs.
///
/// Load failures for unresolvable modules must carry the message pattern
/// `cannot find module '<name>'`; the loader's enhanced diagnosis keys off
/// it.
pub trait Engine {
    /// Eagerly load a module through the synchronous module system and
    /// capture its export. The reference carries a trailing separator when
    /// it names a directory.
    fn load_sync(&mut self, reference: &str) -> Result<ExportedValue, FaultHandle>;

    /// Load a declarative module and return its namespace.
    fn load_static<'a>(
        &'a mut self,
        path: &'a Path,
    ) -> LocalBoxFuture<'a, Result<Namespace, FaultHandle>>;

    /// True when some loader hook is already active on the engine.
    fn has_load_hook(&self) -> bool;

    /// Register the load-time compilation hook. One-shot: the bridge calls
    /// this at most once per invocation.
    fn register_load_hook(&mut self, hook: LoadHook);

    /// Locate the typed-dialect compiler, if the engine bundles one.
    fn typed_compiler(&self) -> Option<Arc<dyn TypedCompiler>>;

    /// Install the process-wide fault channels.
    fn install_fault_channels(&mut self, channels: FaultChannels);

    /// Expose the program's own argument vector to user code.
    fn set_program_args(&mut self, args: &[String]);

    /// Install span instrumentation for outbound remote calls. Engines
    /// without a remote transport can ignore this.
    fn instrument_remote_calls(&mut self, _instrumentation: RemoteCallInstrumentation) {}
}

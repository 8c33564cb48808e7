//! Per-invocation host context.
//!
//! Fault handler registrations, the reported-fault set, the active tracer,
//! and cleanup hooks all live in one explicit [`HostContext`] assembled at
//! startup and torn down deterministically at the end of the invocation.
//! Nothing here mutates process globals.

use crate::engine::{fault_channels, Engine, FaultReceivers};
use crate::fault::FaultHandle;
use crate::invocation::HostEnv;
use crate::trace::ExecutionTracer;

/// Callback hooks supplied by the driving orchestrator.
pub trait HostEvents {
    /// Invoked once, as soon as program loading begins.
    fn program_started(&self);

    /// Sink for faults the classifier has logged.
    fn report_logged_error(&self, fault: &FaultHandle);

    /// Whether the orchestrator has already reported this fault elsewhere.
    fn is_error_reported(&self, fault: &FaultHandle) -> bool;

    /// Synchronous disconnect performed by the cleanup step at the end of
    /// every invocation, regardless of outcome.
    fn disconnect(&self) {}
}

/// The explicit per-invocation context.
pub struct HostContext {
    /// Environment flags, captured once at startup.
    pub env: HostEnv,

    /// The execution tracer for this run.
    pub tracer: ExecutionTracer,

    receivers: Option<FaultReceivers>,
    cleanup: Vec<Box<dyn FnOnce()>>,
}

impl HostContext {
    /// Assemble a fresh context from captured environment flags.
    pub fn new(env: HostEnv) -> Self {
        Self {
            env,
            tracer: ExecutionTracer::new(),
            receivers: None,
            cleanup: Vec::new(),
        }
    }

    /// Create the two fault channels and install their sender ends on the
    /// engine. The receiver ends stay here for the run loop to drain.
    pub fn install_fault_channels(&mut self, engine: &mut dyn Engine) {
        let (channels, receivers) = fault_channels();
        engine.install_fault_channels(channels);
        self.receivers = Some(receivers);
    }

    /// Take the fault receivers for draining. `None` until
    /// [`install_fault_channels`](Self::install_fault_channels) has run.
    pub fn take_fault_receivers(&mut self) -> Option<FaultReceivers> {
        self.receivers.take()
    }

    /// Register a hook to run at teardown, after the tracer has shut down.
    pub fn on_cleanup(&mut self, hook: Box<dyn FnOnce()>) {
        self.cleanup.push(hook);
    }

    /// Tear the context down: close the root span, then run the cleanup
    /// hooks and the orchestrator disconnect. Cleanup always runs last.
    pub fn teardown(mut self, events: &dyn HostEvents) {
        self.tracer.stop();
        for hook in self.cleanup.drain(..) {
            hook();
        }
        events.disconnect();
    }
}

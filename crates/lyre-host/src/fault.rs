//! Program fault values carried across the host's failure channels.
//!
//! A [`ProgramFault`] is anything user code or the engine can raise during a
//! run. Faults travel as [`FaultHandle`]s (shared allocations) because one
//! logical fault can surface on both failure channels: identity for
//! deduplication is the allocation, not the content.

use std::fmt;
use std::sync::Arc;

/// Shared handle to a fault. Cloning preserves identity.
pub type FaultHandle = Arc<ProgramFault>;

/// Classification-relevant fault kinds, matched in order by the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultKind {
    /// Expected, user-facing failure from the run domain. The stack is
    /// always suppressed for these.
    Run,

    /// Syntax or type diagnostic produced by the dialect compiler. The
    /// diagnostic text already names the offending location.
    CompilerDiagnostic,

    /// Fault tagged with the resource it concerns.
    Resource {
        /// Name of the resource the fault correlates to, when known.
        resource: Option<String>,
        /// The fault's creator asked for the stack to be hidden.
        hide_stack: bool,
    },

    /// Anything else.
    Generic,
}

/// A fault raised during program loading or execution.
#[derive(Debug)]
pub struct ProgramFault {
    kind: FaultKind,
    message: String,
    trace: Option<String>,
}

/// Stable identity of a fault instance, keyed by its allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaultIdentity(usize);

impl ProgramFault {
    /// Create a fault of the given kind.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trace: None,
        }
    }

    /// Create an expected, user-facing run fault.
    pub fn run(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Run, message)
    }

    /// Create a compiler syntax/type diagnostic fault.
    pub fn compiler_diagnostic(message: impl Into<String>) -> Self {
        Self::new(FaultKind::CompilerDiagnostic, message)
    }

    /// Create a generic fault.
    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Generic, message)
    }

    /// Attach a captured trace to the fault.
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Wrap the fault in a shared handle.
    pub fn into_handle(self) -> FaultHandle {
        Arc::new(self)
    }

    pub fn kind(&self) -> &FaultKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }
}

impl fmt::Display for ProgramFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProgramFault {}

/// Identity of a shared fault handle, for the reported set.
pub fn fault_identity(fault: &FaultHandle) -> FaultIdentity {
    FaultIdentity(Arc::as_ptr(fault) as usize)
}

/// Render the full user-facing form of a fault: its message, followed by the
/// captured trace when one is present.
pub fn default_error_message(fault: &ProgramFault) -> String {
    match fault.trace() {
        Some(trace) if !trace.is_empty() => format!("{}\n{}", fault.message(), trace),
        _ => fault.message().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_per_allocation() {
        let a = ProgramFault::generic("boom").into_handle();
        let b = ProgramFault::generic("boom").into_handle();

        assert_eq!(fault_identity(&a), fault_identity(&a.clone()));
        assert_ne!(fault_identity(&a), fault_identity(&b));
    }

    #[test]
    fn default_message_includes_trace() {
        let fault = ProgramFault::generic("boom").with_trace("at entry.lyr:3");
        assert_eq!(default_error_message(&fault), "boom\nat entry.lyr:3");
    }

    #[test]
    fn default_message_without_trace_is_bare() {
        let fault = ProgramFault::run("expected failure");
        assert_eq!(default_error_message(&fault), "expected failure");
    }
}

//! The failure classifier: single point of fault classification,
//! deduplication, and formatting.
//!
//! Both process-wide fault channels funnel into [`FaultClassifier::handle`].
//! One logical fault can be observed by several chained continuations of the
//! same rejected deferred value, so the classifier is idempotent per fault
//! instance by necessity.

use crate::context::HostEvents;
use crate::fault::{default_error_message, fault_identity, FaultHandle, FaultIdentity, FaultKind};
use crate::trace::Span;
use std::collections::HashSet;
use tracing::error;

/// Fault identities already handled during this invocation.
///
/// Consulted and mutated only by the classifier.
#[derive(Debug, Default)]
pub struct ReportedErrorSet {
    seen: HashSet<FaultIdentity>,
}

impl ReportedErrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an identity; returns false when it was already present.
    pub fn insert(&mut self, identity: FaultIdentity) -> bool {
        self.seen.insert(identity)
    }

    pub fn contains(&self, identity: FaultIdentity) -> bool {
        self.seen.contains(&identity)
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

/// Classifies, logs, and reports uncaught faults exactly once each.
pub struct FaultClassifier<'a> {
    program: String,
    events: &'a dyn HostEvents,
    reported: ReportedErrorSet,
}

impl<'a> FaultClassifier<'a> {
    /// Create a classifier for the program named in generic messages.
    pub fn new(program: impl Into<String>, events: &'a dyn HostEvents) -> Self {
        Self {
            program: program.into(),
            events,
            reported: ReportedErrorSet::new(),
        }
    }

    /// Handle one uncaught fault: deduplicate, classify, log, record a span
    /// event, and hand it to the orchestrator's reported-fault sink.
    pub fn handle(&mut self, fault: &FaultHandle, span: &mut Span) {
        // The same fault instance arrives once per channel it propagated
        // through; report it only the first time.
        if self.events.is_error_reported(fault) || !self.reported.insert(fault_identity(fault)) {
            return;
        }

        match fault.kind() {
            FaultKind::Run => {
                // Expected, user-facing: message only, never the stack.
                error!("{}", fault.message());
            }
            FaultKind::CompilerDiagnostic => {
                error!(
                    "running program '{}' failed with an unhandled exception:\n{}",
                    self.program,
                    truncate_at_message(fault)
                );
            }
            FaultKind::Resource {
                resource,
                hide_stack,
            } => {
                let message = if *hide_stack {
                    fault.message().to_string()
                } else {
                    default_error_message(fault)
                };
                match resource {
                    Some(name) => error!(resource = %name, "{message}"),
                    None => error!("{message}"),
                }
            }
            FaultKind::Generic => {
                error!(
                    "running program '{}' failed with an unhandled exception:\n{}",
                    self.program,
                    default_error_message(fault)
                );
            }
        }

        span.add_event(format!("uncaughtError: {}", default_error_message(fault)));
        self.events.report_logged_error(fault);
    }

    /// How many distinct faults have been reported so far.
    pub fn reported_count(&self) -> usize {
        self.reported.seen.len()
    }
}

/// Compiler diagnostics embed their own message at the fault site inside the
/// captured trace; keep only the portion preceding it plus the message, so
/// internal frames below the diagnostic stay hidden.
fn truncate_at_message(fault: &FaultHandle) -> String {
    let message = fault.message();
    let Some(trace) = fault.trace() else {
        return message.to_string();
    };

    let mut parts = trace.split(message);
    match (parts.next(), parts.next(), parts.next()) {
        // Exactly one occurrence: everything before it, plus the message.
        (Some(before), Some(_after), None) => format!("{before}{message}"),
        _ => message.to_string(),
    }
}

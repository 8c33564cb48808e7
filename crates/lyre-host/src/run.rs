//! The run operation: end-to-end control flow for one program invocation.

use crate::bridge;
use crate::classify::FaultClassifier;
use crate::context::{HostContext, HostEvents};
use crate::engine::Engine;
use crate::error::HostError;
use crate::export::ProgramResult;
use crate::invocation::{host_runtime_version, HostEnv, ProgramInvocation, RunArgs};
use crate::loader;
use crate::trace::{tracing_enabled, ExecutionTracer};
use futures::future::LocalBoxFuture;
use serde_json::Value;
use tracing::{debug, error};

/// Outcome of one program invocation.
#[derive(Debug, PartialEq)]
pub enum RunOutcome {
    /// The program completed; carries its normalized exported value.
    Completed(Option<Value>),

    /// The run faulted. The fault has been classified and reported; nothing
    /// remains for the caller to log.
    Faulted,

    /// A user-actionable load diagnostic has been printed in full; the
    /// process should exit with
    /// [`EXIT_AFTER_DIAGNOSTIC`](crate::invocation::EXIT_AFTER_DIAGNOSTIC)
    /// and the orchestrator must not report further issues.
    DiagnosticPrinted,
}

/// The external resource-tracking wrapper around program execution.
///
/// The host hands it the whole program body as a zero-argument asynchronous
/// computation; the wrapper returns the settled result, applying whatever
/// resource-tracking semantics it implements. Those semantics are opaque
/// here.
pub trait ExecutionWrapper {
    fn execute<'a>(
        &'a self,
        body: LocalBoxFuture<'a, ProgramResult>,
    ) -> LocalBoxFuture<'a, ProgramResult>;
}

/// Pass-through wrapper for invocations without resource tracking.
pub struct DirectExecution;

impl ExecutionWrapper for DirectExecution {
    fn execute<'a>(
        &'a self,
        body: LocalBoxFuture<'a, ProgramResult>,
    ) -> LocalBoxFuture<'a, ProgramResult> {
        body
    }
}

/// Run one program invocation to completion.
///
/// Control flow: start tracing → resolve the program → activate the
/// compiler bridge → install fault channels → load, normalize, and execute
/// through the wrapper → classify anything uncaught → close spans → run the
/// cleanup step. Loading and execution always settle strictly before the
/// root span closes, and cleanup always runs last.
pub async fn run(
    args: RunArgs,
    env: HostEnv,
    engine: &mut dyn Engine,
    events: &dyn HostEvents,
    wrapper: &dyn ExecutionWrapper,
) -> RunOutcome {
    let mut ctx = HostContext::new(env);

    if let Some(url) = args.tracing.as_deref() {
        if tracing_enabled(Some(url), ctx.env.experimental) {
            ctx.tracer.start(url);
        }
    }
    let mut span = ctx.tracer.new_span("lyre-runtime.run");

    // A --pwd directive switches directories before anything resolves.
    if let Some(pwd) = &args.pwd {
        if let Err(e) = std::env::set_current_dir(pwd) {
            error!("could not switch to directory {}: {}", pwd.display(), e);
            span.end();
            ctx.teardown(events);
            return RunOutcome::Faulted;
        }
    }

    let Some(reference) = args.positional.first().cloned() else {
        error!("no program reference was given to run");
        span.end();
        ctx.teardown(events);
        return RunOutcome::Faulted;
    };
    let program_args: Vec<String> = args.positional[1..].to_vec();

    let cwd = std::env::current_dir().unwrap_or_default();
    let resolved = lyre_project::resolve_program(&reference, &cwd).await;

    // One-shot compiler strategy decision, before any user module loads.
    span.set_attribute("typed-dialect-enabled", ctx.env.typed);
    let activation = bridge::activate(engine, &resolved.manifest, &ctx.env, &cwd);

    let invocation = ProgramInvocation {
        raw_reference: reference,
        resolved_path: resolved.program,
        package_root: resolved.package_root,
        module_system: loader::module_system_for(&resolved.manifest),
        manifest: resolved.manifest,
        compile_mode: activation.compile_mode,
    };

    // User code observes only its own argument vector.
    engine.set_program_args(&program_args);
    engine.instrument_remote_calls(ctx.tracer.remote_call_instrumentation());
    ctx.install_fault_channels(engine);

    events.program_started();

    let program_name = invocation.resolved_path.display().to_string();
    let mut classifier = FaultClassifier::new(&program_name, events);

    // An explicitly overridden compiler configuration that does not exist is
    // fatal, surfaced only after program_started.
    if let Some(path) = activation.missing_config_override {
        span.add_event("missing compiler configuration file");
        let fault = HostError::MissingCompilerConfig { path }.into_fault();
        classifier.handle(&fault, &mut span);
        span.end();
        ctx.teardown(events);
        return RunOutcome::Faulted;
    }

    let body = run_program(engine, &invocation, &ctx.tracer, &program_args);
    let result = wrapper.execute(Box::pin(body)).await;

    let mut receivers = ctx.take_fault_receivers();

    let outcome = match result {
        Ok(value) => RunOutcome::Completed(value),
        Err(fault) => {
            if loader::diagnose_load_failure(&invocation.resolved_path, &fault).await {
                // Everything user-actionable has been printed.
                span.end();
                ctx.teardown(events);
                return RunOutcome::DiagnosticPrinted;
            }
            classifier.handle(&fault, &mut span);
            RunOutcome::Faulted
        }
    };

    // Both channels may have delivered faults during execution, possibly the
    // same instances already settled above; the classifier deduplicates.
    if let Some(receivers) = receivers.as_mut() {
        while let Ok(fault) = receivers.uncaught.try_recv() {
            classifier.handle(&fault, &mut span);
        }
        while let Ok(fault) = receivers.unhandled.try_recv() {
            classifier.handle(&fault, &mut span);
        }
    }

    // Execution has fully settled; only now may the spans close, with the
    // cleanup step after them.
    span.end();
    ctx.teardown(events);
    outcome
}

/// The program body handed to the execution wrapper: compatibility gate,
/// load, secondary diagnostics, then settlement of the exported value.
async fn run_program(
    engine: &mut dyn Engine,
    invocation: &ProgramInvocation,
    tracer: &ExecutionTracer,
    program_args: &[String],
) -> ProgramResult {
    debug!(
        "running program '{}' in pwd '{}' with args: {:?}",
        invocation.resolved_path.display(),
        std::env::current_dir().unwrap_or_default().display(),
        program_args
    );

    let mut span = tracer.new_span("lyre-runtime.run-program");

    if let Err(e) = loader::check_engine_compatibility(
        tracer,
        &invocation.package_root,
        &invocation.manifest,
        &host_runtime_version(),
    ) {
        span.add_event("incompatible runtime version");
        span.end();
        return Err(e.into_fault());
    }

    let export = match loader::load_program(engine, invocation).await {
        Ok(export) => export,
        Err(e) => {
            let fault = e.into_fault();
            if loader::missing_module_name(fault.message()).is_some() {
                span.add_event("module load failure");
            }
            span.end();
            return Err(fault);
        }
    };

    loader::warn_on_compiled_and_source_siblings(&invocation.resolved_path).await;

    // The load itself is bracketed; the program's own settlement is not.
    span.end();
    export.settle().await
}

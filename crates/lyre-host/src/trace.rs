//! Execution tracing over an immediate-flush HTTP span sender.
//!
//! The tracer is a no-op unless started with a destination endpoint (and the
//! experimental opt-in, checked by the caller through [`tracing_enabled`]).
//! Spans form a well-nested tree under one root span; each span is exported
//! the moment it ends, so shutdown never needs to flush.

use serde_json::json;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Name of this service in the distributed system, and the tracer name.
pub const SERVICE_NAME: &str = "lyre-runtime";

// Attribute keys fixed by the exporter's conventions.
const ATTR_SERVICE_NAME: &str = "service.name";
const ATTR_SERVICE_VERSION: &str = "service.version";

/// Whether tracing should be started at all: requires a nonempty endpoint
/// and the experimental-features opt-in.
pub fn tracing_enabled(endpoint: Option<&str>, experimental: bool) -> bool {
    matches!(endpoint, Some(url) if !url.is_empty()) && experimental
}

/// Reject endpoint forms the exporter protocol cannot speak.
///
/// The engine's legacy trace server hands out `tcp://127.0.0.1` URIs when the
/// user points tracing at a file; those are structurally incompatible with
/// the HTTP span exporter, so tracing stays disabled with a warning.
fn validate_url(destination: &str) -> bool {
    if destination.starts_with("tcp://127.0.0.1") {
        warn!(
            "detected an incompatible tracing URI; refusing to enable tracing for the Lyre \
             runtime. If you provided a file target with the --tracing flag, understand that \
             the runtime does not support sending trace information to files."
        );
        return false;
    }
    true
}

type SpanId = usize;

#[derive(Debug)]
struct SpanData {
    name: String,
    parent: Option<SpanId>,
    tags: Vec<(String, String)>,
    events: Vec<String>,
    opened_wall: SystemTime,
    opened: Instant,
    ended: bool,
}

#[derive(Default)]
struct TracerState {
    spans: Vec<SpanData>,
    active: Option<SpanId>,
    root: Option<SpanId>,
    exporter: Option<SpanExporter>,
}

impl TracerState {
    fn open_span(&mut self, name: &str) -> SpanId {
        let parent = self.active.or(self.root);
        let id = self.spans.len();
        self.spans.push(SpanData {
            name: name.to_string(),
            parent,
            tags: Vec::new(),
            events: Vec::new(),
            opened_wall: SystemTime::now(),
            opened: Instant::now(),
            ended: false,
        });
        self.active = Some(id);
        id
    }

    fn end_span(&mut self, id: SpanId) {
        let Some(span) = self.spans.get_mut(id) else {
            return;
        };
        if span.ended {
            return;
        }
        span.ended = true;
        let duration = span.opened.elapsed();
        // Restore the parent as the active span, but only if this span still
        // is the active one; out-of-order ends must not corrupt the tree.
        if self.active == Some(id) {
            self.active = span.parent;
        }
        if let Some(exporter) = &self.exporter {
            exporter.export(&self.spans[id], duration);
        }
    }
}

/// Immediate-flush span sender: one HTTP POST per finished span.
struct SpanExporter {
    endpoint: String,
    version: String,
    agent: ureq::Agent,
}

impl SpanExporter {
    fn export(&self, span: &SpanData, duration: Duration) {
        let timestamp = span
            .opened_wall
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_micros() as u64;

        let mut tags = serde_json::Map::new();
        tags.insert(ATTR_SERVICE_NAME.into(), json!(SERVICE_NAME));
        tags.insert(ATTR_SERVICE_VERSION.into(), json!(self.version));
        for (key, value) in &span.tags {
            tags.insert(key.clone(), json!(value));
        }

        let annotations: Vec<_> = span
            .events
            .iter()
            .map(|event| json!({ "timestamp": timestamp, "value": event }))
            .collect();

        let payload = json!([{
            "name": span.name,
            "timestamp": timestamp,
            "duration": duration.as_micros() as u64,
            "localEndpoint": { "serviceName": SERVICE_NAME },
            "tags": tags,
            "annotations": annotations,
        }]);

        if let Err(e) = self.agent.post(&self.endpoint).send_json(payload) {
            debug!("failed to export span '{}': {}", span.name, e);
        }
    }
}

/// A span handle. Ending it belongs to whoever requested it; unended spans
/// close when the handle drops, so every span closes on every exit path.
pub struct Span {
    state: Option<Weak<RefCell<TracerState>>>,
    id: SpanId,
    ended: bool,
}

impl Span {
    fn noop() -> Self {
        Span {
            state: None,
            id: 0,
            ended: true,
        }
    }

    /// Tag the span with a key/value attribute.
    pub fn set_attribute(&mut self, key: &str, value: impl ToString) {
        self.with_data(|span| span.tags.push((key.to_string(), value.to_string())));
    }

    /// Record a point-in-time event on the span.
    pub fn add_event(&mut self, event: impl Into<String>) {
        let event = event.into();
        self.with_data(|span| span.events.push(event));
    }

    /// End the span. Idempotent.
    pub fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        if let Some(state) = self.state.as_ref().and_then(Weak::upgrade) {
            state.borrow_mut().end_span(self.id);
        }
    }

    fn with_data(&mut self, f: impl FnOnce(&mut SpanData)) {
        if self.ended {
            return;
        }
        if let Some(state) = self.state.as_ref().and_then(Weak::upgrade) {
            if let Some(span) = state.borrow_mut().spans.get_mut(self.id) {
                f(span);
            }
        }
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        self.end();
    }
}

/// Opens child spans around outbound remote calls.
///
/// Handed to the engine at startup so its transport can bracket every
/// outbound call without reaching into the tracer.
#[derive(Clone)]
pub struct RemoteCallInstrumentation {
    state: Weak<RefCell<TracerState>>,
}

impl RemoteCallInstrumentation {
    /// Open a span for one outbound call. The caller ends it when the call
    /// settles.
    pub fn start_call(&self, target: &str) -> Span {
        let Some(state) = self.state.upgrade() else {
            return Span::noop();
        };
        let mut inner = state.borrow_mut();
        if inner.root.is_none() {
            return Span::noop();
        }
        let id = inner.open_span(&format!("remote-call.{target}"));
        drop(inner);
        Span {
            state: Some(Rc::downgrade(&state)),
            id,
            ended: false,
        }
    }
}

/// The execution tracer bracketing one run.
pub struct ExecutionTracer {
    state: Rc<RefCell<TracerState>>,
    version: String,
}

impl ExecutionTracer {
    /// A tracer in the disabled state. Spans requested now are usable no-op
    /// handles.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(TracerState::default())),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Start tracing toward `destination`, opening the root span.
    ///
    /// Incompatible destinations leave the tracer disabled with a warning.
    pub fn start(&self, destination: &str) {
        if !validate_url(destination) {
            return;
        }
        let mut state = self.state.borrow_mut();
        debug!("registering tracing endpoint: {destination}");
        state.exporter = Some(SpanExporter {
            endpoint: destination.to_string(),
            version: self.version.clone(),
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(5))
                .build(),
        });
        let root = state.open_span(&format!("{SERVICE_NAME}-root"));
        state.root = Some(root);
        state.active = None;
    }

    /// Whether `start` actually enabled tracing.
    pub fn started(&self) -> bool {
        self.state.borrow().root.is_some()
    }

    /// Open a child span parented to the currently active span, or to the
    /// root span if none is active. Always returns a usable handle, even
    /// before `start`.
    pub fn new_span(&self, name: &str) -> Span {
        let mut state = self.state.borrow_mut();
        if state.root.is_none() {
            return Span::noop();
        }
        let id = state.open_span(name);
        Span {
            state: Some(Rc::downgrade(&self.state)),
            id,
            ended: false,
        }
    }

    /// Instrumentation handle for outbound remote calls.
    pub fn remote_call_instrumentation(&self) -> RemoteCallInstrumentation {
        RemoteCallInstrumentation {
            state: Rc::downgrade(&self.state),
        }
    }

    /// Shut the tracer down, ending the root span if tracing ever started.
    /// The sender needs no flush: it exports each span as it ends.
    pub fn stop(&self) {
        let mut state = self.state.borrow_mut();
        if let Some(root) = state.root.take() {
            debug!("shutting down tracer");
            state.end_span(root);
        }
    }
}

impl Default for ExecutionTracer {
    fn default() -> Self {
        Self::new()
    }
}

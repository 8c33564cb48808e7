//! Shared test doubles for the host integration suites.
#![allow(dead_code)]

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use lyre_host::{
    Engine, ExportedValue, FaultChannels, FaultHandle, FaultIdentity, HostEvents, LoadHook,
    Namespace, TypedCompiler,
};
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub type SyncLoad = Box<dyn FnMut(&str, Option<&FaultChannels>) -> Result<ExportedValue, FaultHandle>>;
pub type StaticLoad = Box<dyn FnMut(&Path) -> Result<Namespace, FaultHandle>>;

/// Engine double driven by per-test closures.
#[derive(Default)]
pub struct ScriptedEngine {
    /// Behavior of synchronous loads; defaults to an empty export.
    pub sync_load: Option<SyncLoad>,

    /// Behavior of static loads; defaults to an empty namespace.
    pub static_load: Option<StaticLoad>,

    /// Fault channel senders installed by the host.
    pub channels: Option<FaultChannels>,

    /// References handed to synchronous loads, in order.
    pub sync_references: Vec<String>,

    /// Paths handed to static loads, in order.
    pub static_paths: Vec<PathBuf>,

    /// Program argument vector the host exposed to user code.
    pub program_args: Vec<String>,

    /// Load hook registered by the compiler bridge, if any.
    pub registered_hook: Option<LoadHook>,
}

impl Engine for ScriptedEngine {
    fn load_sync(&mut self, reference: &str) -> Result<ExportedValue, FaultHandle> {
        self.sync_references.push(reference.to_string());
        match &mut self.sync_load {
            Some(load) => load(reference, self.channels.as_ref()),
            None => Ok(ExportedValue::empty()),
        }
    }

    fn load_static<'a>(
        &'a mut self,
        path: &'a Path,
    ) -> LocalBoxFuture<'a, Result<Namespace, FaultHandle>> {
        self.static_paths.push(path.to_owned());
        let result = match &mut self.static_load {
            Some(load) => load(path),
            None => Ok(Namespace::new()),
        };
        async move { result }.boxed_local()
    }

    fn has_load_hook(&self) -> bool {
        false
    }

    fn register_load_hook(&mut self, hook: LoadHook) {
        self.registered_hook = Some(hook);
    }

    fn typed_compiler(&self) -> Option<Arc<dyn TypedCompiler>> {
        None
    }

    fn install_fault_channels(&mut self, channels: FaultChannels) {
        self.channels = Some(channels);
    }

    fn set_program_args(&mut self, args: &[String]) {
        self.program_args = args.to_vec();
    }
}

/// Orchestrator double recording every callback.
#[derive(Default)]
pub struct RecordingEvents {
    pub started: Cell<u32>,
    pub reported: RefCell<Vec<FaultHandle>>,
    pub already_reported: RefCell<Vec<FaultIdentity>>,
    pub disconnected: Cell<bool>,
}

impl HostEvents for RecordingEvents {
    fn program_started(&self) {
        self.started.set(self.started.get() + 1);
    }

    fn report_logged_error(&self, fault: &FaultHandle) {
        self.reported.borrow_mut().push(fault.clone());
    }

    fn is_error_reported(&self, fault: &FaultHandle) -> bool {
        self.already_reported
            .borrow()
            .contains(&lyre_host::fault_identity(fault))
    }

    fn disconnect(&self) {
        self.disconnected.set(true);
    }
}

/// Log writer capturing formatted tracing output for assertions.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Capture {
    type Writer = Capture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

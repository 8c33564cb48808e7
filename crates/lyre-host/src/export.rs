//! Exported program values and their normalization.
//!
//! A loaded module hands back exactly one of three shapes: a callable body,
//! a plain value, or a declarative namespace. [`ExportedValue::settle`] is
//! the single normalization point: callables are invoked with no arguments
//! and awaited, plain values are awaited if still settling, and namespaces
//! settle binding-by-binding into an object.

use crate::fault::FaultHandle;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// The settled result of a program: its output value, or a fault.
pub type ProgramResult = Result<Option<Value>, FaultHandle>;

/// A zero-argument program body produced by a callable export.
pub type ProgramBody = Box<dyn FnOnce() -> LocalBoxFuture<'static, ProgramResult>>;

/// A plain value that may be immediately available or still settling.
pub enum Eventual {
    Ready(Option<Value>),
    Pending(LocalBoxFuture<'static, ProgramResult>),
}

/// The closed set of shapes a loaded module can export.
pub enum ExportedValue {
    /// Invoke with no arguments, await the settlement.
    Callable(ProgramBody),
    /// Use as-is; awaited if itself deferred.
    Plain(Eventual),
    /// A declarative module namespace.
    Namespace(Namespace),
}

impl ExportedValue {
    /// An immediately available plain value.
    pub fn ready(value: Value) -> Self {
        ExportedValue::Plain(Eventual::Ready(Some(value)))
    }

    /// A plain export with no value at all.
    pub fn empty() -> Self {
        ExportedValue::Plain(Eventual::Ready(None))
    }

    /// Normalize and settle this export into the program's result.
    pub fn settle(self) -> LocalBoxFuture<'static, ProgramResult> {
        match self {
            ExportedValue::Callable(body) => body(),
            ExportedValue::Plain(Eventual::Ready(value)) => {
                futures::future::ready(Ok(value)).boxed_local()
            }
            ExportedValue::Plain(Eventual::Pending(fut)) => fut,
            ExportedValue::Namespace(namespace) => namespace.settle(),
        }
    }
}

impl fmt::Debug for ExportedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportedValue::Callable(_) => f.write_str("Callable"),
            ExportedValue::Plain(Eventual::Ready(value)) => {
                f.debug_tuple("Plain").field(value).finish()
            }
            ExportedValue::Plain(Eventual::Pending(_)) => f.write_str("Plain(<pending>)"),
            ExportedValue::Namespace(ns) => f.debug_tuple("Namespace").field(ns).finish(),
        }
    }
}

/// A declarative module namespace: named bindings, possibly with a
/// distinguished `default` binding.
#[derive(Default)]
pub struct Namespace {
    bindings: BTreeMap<String, ExportedValue>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding. The name `"default"` is the distinguished binding.
    pub fn insert(&mut self, name: impl Into<String>, value: ExportedValue) -> &mut Self {
        self.bindings.insert(name.into(), value);
        self
    }

    /// Remove and return the `default` binding, if present.
    pub fn remove_default(&mut self) -> Option<ExportedValue> {
        self.bindings.remove("default")
    }

    /// Names of all remaining bindings, in stable order.
    pub fn binding_names(&self) -> Vec<String> {
        self.bindings.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Settle every binding into an object value.
    fn settle(self) -> LocalBoxFuture<'static, ProgramResult> {
        async move {
            let mut object = serde_json::Map::new();
            for (name, value) in self.bindings {
                let settled = value.settle().await?;
                object.insert(name, settled.unwrap_or(Value::Null));
            }
            Ok(Some(Value::Object(object)))
        }
        .boxed_local()
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.bindings.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::ProgramFault;
    use serde_json::json;

    #[tokio::test]
    async fn plain_ready_settles_immediately() {
        let value = ExportedValue::ready(json!({"out": 1}));
        assert_eq!(value.settle().await.unwrap(), Some(json!({"out": 1})));
    }

    #[tokio::test]
    async fn plain_pending_is_awaited() {
        let value = ExportedValue::Plain(Eventual::Pending(
            async { Ok(Some(json!(42))) }.boxed_local(),
        ));
        assert_eq!(value.settle().await.unwrap(), Some(json!(42)));
    }

    #[tokio::test]
    async fn callable_is_invoked_and_awaited() {
        let value = ExportedValue::Callable(Box::new(|| {
            async { Ok(Some(json!("done"))) }.boxed_local()
        }));
        assert_eq!(value.settle().await.unwrap(), Some(json!("done")));
    }

    #[tokio::test]
    async fn callable_fault_propagates() {
        let value = ExportedValue::Callable(Box::new(|| {
            async { Err(ProgramFault::run("nope").into_handle()) }.boxed_local()
        }));
        let err = value.settle().await.unwrap_err();
        assert_eq!(err.message(), "nope");
    }

    #[tokio::test]
    async fn namespace_settles_bindings_into_object() {
        let mut ns = Namespace::new();
        ns.insert("first", ExportedValue::ready(json!(1)));
        ns.insert(
            "second",
            ExportedValue::Plain(Eventual::Pending(
                async { Ok(Some(json!(2))) }.boxed_local(),
            )),
        );

        let settled = ExportedValue::Namespace(ns).settle().await.unwrap();
        assert_eq!(settled, Some(json!({"first": 1, "second": 2})));
    }
}

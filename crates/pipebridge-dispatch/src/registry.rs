use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use pipebridge_codec::Value;
use tracing::warn;

/// Error type returned by handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of a handler.
pub type HandlerResult = std::result::Result<Value, HandlerError>;

type Handler = Arc<dyn Fn(Value) -> HandlerResult + Send + Sync>;

/// Immutable name-to-handler table consulted by the dispatch loop.
///
/// Built once with [`HandlerRegistry::builder`] and then only read. Cloning is
/// cheap; handlers are shared.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    /// Invoke the handler registered under `name`, if any.
    pub fn call(&self, name: &str, args: Value) -> Option<HandlerResult> {
        self.handlers.get(name).map(|handler| handler(args))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Collects handlers before freezing them into a [`HandlerRegistry`].
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: BTreeMap<String, Handler>,
}

impl HandlerRegistryBuilder {
    /// Register `handler` under `name`. A later registration of the same name
    /// replaces the earlier one.
    pub fn register<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> HandlerResult + Send + Sync + 'static,
    {
        let name = name.into();
        if self.handlers.insert(name.clone(), Arc::new(handler)).is_some() {
            warn!(function = %name, "handler registered twice, keeping the last one");
        }
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}

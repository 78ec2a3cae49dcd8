//! HandlerRegistry - resolve handlers by name.
//!
//! Populated once at startup by whoever parses the process configuration.
//! The engine itself only ever sees already-resolved `Arc<dyn BatchHandler>`
//! values.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::handler::BatchHandler;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Handler '{0}' is not registered (known: {1:?})")]
    NotRegistered(String, Vec<String>),
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<String, Arc<dyn BatchHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Register a handler under its own name.
    pub fn register(&mut self, handler: Arc<dyn BatchHandler>) -> Result<(), RegistryError> {
        let name = handler.name().to_string();
        self.register_as(name, handler)
    }

    /// Register a handler under an alias.
    pub fn register_as(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn BatchHandler>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.handlers.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn BatchHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Like `get`, but an unknown name is an error listing the known ones.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn BatchHandler>, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::NotRegistered(name.to_string(), self.names()))
    }

    pub fn names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Batch, HandlerError};
    use crate::typed::handler_fn;

    fn noop(name: &str) -> Arc<dyn BatchHandler> {
        Arc::new(handler_fn(name, |_batch: Batch| async { Ok::<(), HandlerError>(()) }))
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = HandlerRegistry::new();
        registry.register(noop("print")).unwrap();

        let handler = registry.get("print").unwrap();
        assert_eq!(handler.name(), "print");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_double_registration() {
        let mut registry = HandlerRegistry::new();
        registry.register(noop("print")).unwrap();
        let result = registry.register(noop("print"));
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(name)) if name == "print"));
    }

    #[test]
    fn test_alias_and_names() {
        let mut registry = HandlerRegistry::new();
        registry.register(noop("b")).unwrap();
        registry.register_as("a", noop("b")).unwrap();
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.names().len(), 2);
    }

    #[test]
    fn test_resolve_unknown_lists_known_names() {
        let mut registry = HandlerRegistry::new();
        registry.register(noop("log")).unwrap();
        let err = registry.resolve("nope").err().unwrap();
        assert!(err.to_string().contains("nope"));
        assert!(err.to_string().contains("log"));
    }
}

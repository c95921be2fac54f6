//! Tool registry: name-indexed handler lookup with ordered discovery.

use std::collections::HashMap;
use std::sync::Arc;

use protocol::{Tool, ToolError};

use crate::error::{Error, Result};
use crate::handler::ToolHandler;

/// The set of tools a server exposes.
///
/// Built once at startup, immutable afterwards, so lookups need no locking.
/// Indirection by name is what keeps clients decoupled: they only ever see
/// descriptors, never handler internals.
#[derive(Default)]
pub struct ToolRegistry {
    // Registration order drives the discovery listing; the index keeps
    // resolve() O(1).
    handlers: Vec<Arc<dyn ToolHandler>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its descriptor name.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) -> Result<()> {
        let name = handler.name().to_string();
        if self.index.contains_key(&name) {
            return Err(Error::DuplicateTool(name));
        }
        self.index.insert(name, self.handlers.len());
        self.handlers.push(handler);
        Ok(())
    }

    /// Descriptor snapshot in registration order. No side effects; safe to
    /// call repeatedly.
    pub fn list(&self) -> Vec<Tool> {
        self.handlers.iter().map(|h| h.descriptor()).collect()
    }

    /// Look up a handler by name.
    pub fn resolve(&self, name: &str) -> std::result::Result<&Arc<dyn ToolHandler>, ToolError> {
        self.index
            .get(name)
            .map(|&i| &self.handlers[i])
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::testing::EchoTool;

    fn registry_with(names: &[&'static str]) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for &name in names {
            registry.register(Arc::new(EchoTool { name })).unwrap();
        }
        registry
    }

    #[test]
    fn resolve_returns_the_registered_handler() {
        let mut registry = ToolRegistry::new();
        let handler: Arc<dyn ToolHandler> = Arc::new(EchoTool { name: "echo" });
        registry.register(Arc::clone(&handler)).unwrap();

        let resolved = registry.resolve("echo").unwrap();
        assert!(Arc::ptr_eq(resolved, &handler));
    }

    #[test]
    fn resolve_unknown_name_fails() {
        let registry = registry_with(&["echo"]);
        let err = registry.resolve("nope").unwrap_err();
        assert_eq!(err, ToolError::UnknownTool("nope".to_string()));
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = registry_with(&["echo"]);
        let err = registry
            .register(Arc::new(EchoTool { name: "echo" }))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateTool(name) if name == "echo"));
    }

    #[test]
    fn list_preserves_registration_order() {
        let registry = registry_with(&["c", "a", "b"]);
        let names: Vec<_> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn list_is_a_snapshot() {
        let registry = registry_with(&["a", "b"]);
        let first = registry.list();
        let second = registry.list();
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].name, second[0].name);
    }
}

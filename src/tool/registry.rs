//! Explicit tool registry.

use super::ToolBinding;
use crate::error::{Error, ErrorContext};
use crate::schema::CallSpec;
use std::collections::HashMap;
use std::sync::Arc;

/// Tool bindings indexed by name, in registration order.
///
/// Built once at setup and read-only afterwards. Cloning is cheap: it clones
/// `Arc` pointers to the bindings.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<ToolBinding>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a binding. Names are unique within a registry.
    pub fn register(&mut self, binding: ToolBinding) -> crate::Result<&mut Self> {
        let name = binding.name().to_string();
        if self.index.contains_key(&name) {
            return Err(Error::configuration_with_context(
                format!("tool '{}' is already registered", name),
                ErrorContext::new()
                    .with_field_path("name")
                    .with_source("tool_registry"),
            ));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(Arc::new(binding));
        Ok(self)
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, binding: ToolBinding) -> crate::Result<Self> {
        self.register(binding)?;
        Ok(self)
    }

    /// Looks up a binding by exact name.
    pub fn get(&self, name: &str) -> Option<&Arc<ToolBinding>> {
        self.index.get(name).and_then(|i| self.tools.get(*i))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Call specifications to hand to the model, in registration order.
    pub fn call_specs(&self) -> Vec<CallSpec> {
        self.tools.iter().map(|t| t.spec().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use crate::tool::ToolError;
    use serde_json::Value;

    fn noop(name: &str) -> ToolBinding {
        ToolBinding::bind(name, "does nothing", Schema::builder().build(), |_: Value| async {
            Ok::<_, ToolError>(Value::Null)
        })
        .unwrap()
    }

    #[test]
    fn test_registration_order_and_lookup() {
        let registry = ToolRegistry::new()
            .with(noop("zeta"))
            .unwrap()
            .with(noop("alpha"))
            .unwrap();

        assert_eq!(registry.names(), vec!["zeta", "alpha"]);
        let specs: Vec<_> = registry.call_specs().into_iter().map(|s| s.name).collect();
        assert_eq!(specs, vec!["zeta", "alpha"]);
        assert!(registry.get("alpha").is_some());
        assert!(registry.get("Alpha").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(noop("lookup")).unwrap();
        let err = registry.register(noop("lookup")).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert_eq!(registry.len(), 1);
    }
}

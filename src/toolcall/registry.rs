//! Tool registry.

use std::sync::Arc;

use crate::types::{Tool, ToolDescriptor};

/// Read-only collection of the tools available to one generation call.
///
/// The registry is immutable after construction and cheap to clone, so it
/// may be shared across concurrent calls. Lookup preserves declaration
/// order, which also fixes the order of descriptors sent to the provider.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<Vec<Tool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Tool>) -> Self {
        Self {
            tools: Arc::new(tools),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    /// Provider-neutral descriptors for a model request.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl From<Vec<Tool>> for ToolRegistry {
    fn from(tools: Vec<Tool>) -> Self {
        Self::new(tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_by_name() {
        let registry = ToolRegistry::new(vec![
            Tool::function("weather", "Get weather", json!({"type":"object"})),
            Tool::function("search", "Search the web", json!({"type":"object"})),
        ]);
        assert!(registry.get("weather").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["weather", "search"]);
    }

    #[test]
    fn descriptors_preserve_declaration_order() {
        let registry = ToolRegistry::new(vec![
            Tool::function("b", "second letter", json!({})),
            Tool::function("a", "first letter", json!({})),
        ]);
        let names: Vec<_> = registry.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn clones_share_storage() {
        let registry = ToolRegistry::new(vec![Tool::function("t", "tool", json!({}))]);
        let clone = registry.clone();
        assert_eq!(clone.len(), 1);
        assert!(!clone.is_empty());
    }
}

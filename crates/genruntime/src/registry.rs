use gencore::{NodeHandler, NodeType, TypeRegistry, WorkflowError};
use std::collections::HashMap;
use std::sync::Arc;

struct Registered {
    definition: NodeType,
    handler: Arc<dyn NodeHandler>,
}

/// Registry of available node types and the handlers that execute them.
///
/// Built once at startup, then shared read-only behind an `Arc`.
#[derive(Default)]
pub struct NodeRegistry {
    entries: HashMap<String, Registered>,
    order: Vec<String>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under the id of the node type it defines.
    /// A later registration for the same id replaces the earlier one.
    pub fn register(&mut self, handler: Arc<dyn NodeHandler>) {
        let definition = handler.definition();
        let node_type = definition.id.clone();
        tracing::info!("Registering node type: {}", node_type);
        if self
            .entries
            .insert(node_type.clone(), Registered { definition, handler })
            .is_some()
        {
            tracing::warn!("Node type {} was already registered, replacing it", node_type);
        } else {
            self.order.push(node_type);
        }
    }

    pub fn handler(&self, node_type: &str) -> Result<Arc<dyn NodeHandler>, WorkflowError> {
        self.entries
            .get(node_type)
            .map(|e| Arc::clone(&e.handler))
            .ok_or_else(|| WorkflowError::NoHandler(node_type.to_string()))
    }

    /// Registered node type ids, in registration order.
    pub fn list_node_types(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &NodeType> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|e| &e.definition))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TypeRegistry for NodeRegistry {
    fn lookup(&self, node_type: &str) -> Option<&NodeType> {
        self.entries.get(node_type).map(|e| &e.definition)
    }
}

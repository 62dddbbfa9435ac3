use crate::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type WorkflowId = Uuid;

/// Instance id of a node, unique within its workflow.
pub type NodeId = String;

/// Per-run static input overrides: node id -> input port -> value.
pub type StaticInputs = HashMap<NodeId, HashMap<String, Value>>;

/// Complete workflow definition as authored on the canvas
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub edges: Vec<WorkflowEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn add_node(&mut self, node: WorkflowNode) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Connect an output port to an input port, returning the new edge id.
    pub fn connect(
        &mut self,
        source: impl Into<NodeId>,
        source_handle: impl Into<String>,
        target: impl Into<NodeId>,
        target_handle: impl Into<String>,
    ) -> String {
        let id = format!("edge_{}", self.edges.len() + 1);
        self.edges.push(WorkflowEdge {
            id: id.clone(),
            source: source.into(),
            source_handle: source_handle.into(),
            target: target.into(),
            target_handle: target_handle.into(),
        });
        id
    }

    pub fn find_node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Edges feeding the given node.
    pub fn incoming<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a WorkflowEdge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Overlay per-run static inputs onto the nodes' own static values.
    /// Overrides for unknown node ids are ignored.
    pub fn with_static_inputs(mut self, overrides: &StaticInputs) -> Self {
        for node_id in overrides.keys() {
            if self.find_node(node_id).is_none() {
                tracing::warn!("Ignoring static inputs for unknown node '{}'", node_id);
            }
        }
        for node in &mut self.nodes {
            if let Some(values) = overrides.get(&node.id) {
                node.data
                    .extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        self
    }
}

/// Node instance in a workflow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    /// Canvas position; ignored by the engine.
    #[serde(default)]
    pub position: Position,
    /// Static input values set by the user, keyed by input port name.
    #[serde(default)]
    pub data: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

impl WorkflowNode {
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            position: Position::default(),
            data: HashMap::new(),
            retry: None,
        }
    }

    pub fn with_value(mut self, port: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(port.into(), value.into());
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Position { x, y };
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, delay_ms: u64) -> Self {
        self.retry = Some(RetryPolicy {
            max_attempts,
            delay_ms,
            backoff_multiplier: 1.0,
        });
        self
    }

    /// Static value for a port, treating `null` as unset.
    pub fn static_value(&self, port: &str) -> Option<&Value> {
        self.data.get(port).filter(|v| !v.is_null())
    }
}

/// Directed connection from an output port to an input port
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEdge {
    pub id: String,
    pub source: NodeId,
    /// Output port name on the source node.
    pub source_handle: String,
    pub target: NodeId,
    /// Input port name on the target node.
    pub target_handle: String,
}

/// Node position in visual editor
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Opt-in retry for a node's handler. Applied inside the node task, so the
/// coordinator sees a single invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
    #[serde(default = "default_backoff")]
    pub backoff_multiplier: f64,
}

fn default_backoff() -> f64 {
    1.0
}

impl RetryPolicy {
    /// Delay before the given retry (1-based attempt that just failed).
    pub fn delay_after(&self, attempt: u32) -> u64 {
        let factor = self
            .backoff_multiplier
            .max(1.0)
            .powi(attempt.saturating_sub(1) as i32);
        (self.delay_ms as f64 * factor) as u64
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_json_uses_canvas_field_names() {
        let json = r#"{
            "id": "6f1c1a54-8b0e-4a55-9a59-1d1f3e1c2a10",
            "name": "cat",
            "nodes": [
                {"id": "node_1", "type": "input.text", "data": {"text": "A cat"}},
                {"id": "node_2", "type": "text.template", "position": {"x": 10.0, "y": 4.0}}
            ],
            "edges": [
                {"id": "e1", "source": "node_1", "sourceHandle": "text",
                 "target": "node_2", "targetHandle": "subject"}
            ]
        }"#;
        let workflow: Workflow = serde_json::from_str(json).unwrap();
        assert_eq!(workflow.nodes[0].node_type, "input.text");
        assert_eq!(workflow.nodes[0].static_value("text"), Some(&Value::from("A cat")));
        assert_eq!(workflow.edges[0].target_handle, "subject");
        assert!(workflow.created_at.is_none());
    }

    #[test]
    fn static_overrides_replace_node_values() {
        let mut workflow = Workflow::new("w");
        workflow.add_node(WorkflowNode::new("a", "t").with_value("x", 1i64));
        let mut overrides = StaticInputs::new();
        overrides.insert("a".into(), HashMap::from([("x".to_string(), Value::from(2i64))]));
        overrides.insert("ghost".into(), HashMap::new());
        let workflow = workflow.with_static_inputs(&overrides);
        assert_eq!(workflow.nodes[0].data["x"], Value::Integer(2));
    }

    #[test]
    fn retry_delay_grows_with_backoff() {
        let policy = RetryPolicy {
            max_attempts: 4,
            delay_ms: 100,
            backoff_multiplier: 2.0,
        };
        assert_eq!(policy.delay_after(1), 100);
        assert_eq!(policy.delay_after(2), 200);
        assert_eq!(policy.delay_after(3), 400);
    }
}

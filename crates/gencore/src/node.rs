use crate::{events::EventEmitter, NodeError, NodeId, PortDefinition, RunId, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Grouping of node types. Doubles as the category of the generation
/// records a node type produces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeCategory {
    Image,
    Video,
    Text,
    Audio,
    Transform,
    #[serde(other)]
    Other,
}

impl NodeCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeCategory::Image => "image",
            NodeCategory::Video => "video",
            NodeCategory::Text => "text",
            NodeCategory::Audio => "audio",
            NodeCategory::Transform => "transform",
            NodeCategory::Other => "other",
        }
    }
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Definition of a node type: its identity and port schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: NodeCategory,
    #[serde(default)]
    pub inputs: Vec<PortDefinition>,
    #[serde(default)]
    pub outputs: Vec<PortDefinition>,
}

impl NodeType {
    pub fn new(id: impl Into<String>, category: NodeCategory) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            category,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input(mut self, port: PortDefinition) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_output(mut self, port: PortDefinition) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn input(&self, name: &str) -> Option<&PortDefinition> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&PortDefinition> {
        self.outputs.iter().find(|p| p.name == name)
    }
}

/// Read-only lookup of node type definitions.
pub trait TypeRegistry: Send + Sync {
    fn lookup(&self, node_type: &str) -> Option<&NodeType>;
}

impl TypeRegistry for HashMap<String, NodeType> {
    fn lookup(&self, node_type: &str) -> Option<&NodeType> {
        self.get(node_type)
    }
}

/// The capability that performs a node type's actual work.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Port schema and metadata of the node type this handler serves.
    fn definition(&self) -> NodeType;

    /// Run the node with its resolved inputs.
    async fn invoke(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError>;
}

/// Execution context passed to each handler invocation
#[derive(Clone)]
pub struct NodeContext {
    pub run_id: RunId,
    pub node_id: NodeId,

    /// Resolved input values keyed by input port name. Unset optional
    /// inputs without a default are absent.
    pub inputs: HashMap<String, Value>,

    /// Informational events (logs, progress percentages).
    pub events: EventEmitter,

    /// Cancelled when the run is cancelled. Long-running handlers should
    /// check it and return `NodeError::Cancelled`.
    pub cancellation: CancellationToken,
}

impl NodeContext {
    pub fn new(run_id: RunId, node_id: impl Into<NodeId>, events: EventEmitter) -> Self {
        Self {
            run_id,
            node_id: node_id.into(),
            inputs: HashMap::new(),
            events,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_input(mut self, port: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(port.into(), value.into());
        self
    }

    /// Get required input or return error
    pub fn require_input(&self, name: &str) -> Result<&Value, NodeError> {
        self.inputs
            .get(name)
            .ok_or_else(|| NodeError::MissingInput(name.to_string()))
    }

    pub fn require_str(&self, name: &str) -> Result<&str, NodeError> {
        let value = self.require_input(name)?;
        value.as_str().ok_or_else(|| NodeError::InvalidInputType {
            field: name.to_string(),
            expected: "string".to_string(),
            actual: value.kind_name().to_string(),
        })
    }

    pub fn input_or(&self, name: &str, default: Value) -> Value {
        self.inputs.get(name).cloned().unwrap_or(default)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Output from node execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeOutput {
    /// Output port values
    pub outputs: HashMap<String, Value>,

    pub metadata: NodeMetadata,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, port: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(port.into(), value.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.metadata.provider = Some(provider.into());
        self.metadata.model = Some(model.into());
        self
    }

    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.metadata.cost_usd = Some(cost_usd);
        self
    }

    pub fn with_media(mut self, media: MediaMetadata) -> Self {
        self.metadata.media = Some(media);
        self
    }
}

/// What a handler reports about the provider call behind its outputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub cost_usd: Option<f64>,
    pub media: Option<MediaMetadata>,
}

/// Media-specific analysis attached to generation records.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_movement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_transitions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_overlay: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

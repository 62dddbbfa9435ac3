use crate::{NodeId, PortType, RunId};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Type check failed: {}", join(.0))]
    TypeMismatch(Vec<TypeMismatch>),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Run error: {0}")]
    Run(#[from] RunError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Invalid transition for node '{node_id}': {from} -> {to}")]
    InvalidTransition {
        node_id: NodeId,
        from: crate::NodeStatus,
        to: crate::NodeStatus,
    },
}

impl From<Vec<TypeMismatch>> for FlowError {
    fn from(mismatches: Vec<TypeMismatch>) -> Self {
        FlowError::TypeMismatch(mismatches)
    }
}

/// Errors raised by node handlers. Contained to the failing node and its
/// dependents; they never abort a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Missing output '{0}' consumed by a downstream node")]
    MissingOutput(String),

    #[error("Invalid output type for '{port}': expected {expected}, got {actual}")]
    InvalidOutputType {
        port: String,
        expected: PortType,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Cancelled")]
    Cancelled,
}

impl NodeError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NodeError::Cancelled)
    }
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("No handler registered for node type: {0}")]
    NoHandler(String),
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Run not found: {0}")]
    NotFound(RunId),

    #[error("Run {run_id} ended abnormally: {reason}")]
    Aborted { run_id: RunId, reason: String },
}

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Node '{node_id}' already has a generation record in run {run_id}")]
    Duplicate { run_id: RunId, node_id: NodeId },

    #[error("Record sink closed")]
    SinkClosed,

    #[error("Failed to write record: {0}")]
    Write(String),
}

/// Structural problems found before a run is created. Each variant carries
/// every instance of its class.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate node ids: {}", .0.join(", "))]
    DuplicateNodeId(Vec<NodeId>),

    #[error("Unknown node types: {}", join(.0))]
    UnknownNodeType(Vec<UnknownNodeType>),

    #[error("Dangling edges: {}", join(.0))]
    DanglingEdge(Vec<DanglingEdge>),

    #[error("Fan-in not allowed: {}", join(.0))]
    FanInViolation(Vec<FanIn>),

    #[error("Cycle detected: {}", .cycle.join(" -> "))]
    CycleDetected { cycle: Vec<NodeId> },

    #[error("Missing required inputs: {}", join(.0))]
    MissingRequiredInput(Vec<MissingInput>),

    #[error("Invalid static inputs: {}", join(.0))]
    InvalidStaticInput(Vec<InvalidStatic>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnknownNodeType {
    pub node_id: NodeId,
    pub node_type: String,
}

impl fmt::Display for UnknownNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node '{}' has type '{}'", self.node_id, self.node_type)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DanglingEdge {
    pub edge_id: String,
    pub reason: DanglingReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DanglingReason {
    MissingSourceNode(NodeId),
    MissingTargetNode(NodeId),
    MissingOutputPort { node_id: NodeId, port: String },
    MissingInputPort { node_id: NodeId, port: String },
}

impl fmt::Display for DanglingEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            DanglingReason::MissingSourceNode(node) => {
                write!(f, "edge '{}' source node '{}' does not exist", self.edge_id, node)
            }
            DanglingReason::MissingTargetNode(node) => {
                write!(f, "edge '{}' target node '{}' does not exist", self.edge_id, node)
            }
            DanglingReason::MissingOutputPort { node_id, port } => write!(
                f,
                "edge '{}' source '{}' has no output port '{}'",
                self.edge_id, node_id, port
            ),
            DanglingReason::MissingInputPort { node_id, port } => write!(
                f,
                "edge '{}' target '{}' has no input port '{}'",
                self.edge_id, node_id, port
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FanIn {
    pub node_id: NodeId,
    pub port: String,
    pub edge_ids: Vec<String>,
}

impl fmt::Display for FanIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "input '{}.{}' is fed by edges [{}]",
            self.node_id,
            self.port,
            self.edge_ids.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MissingInput {
    pub node_id: NodeId,
    pub port: String,
}

impl fmt::Display for MissingInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}.{}'", self.node_id, self.port)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvalidStatic {
    pub node_id: NodeId,
    pub port: String,
    pub reason: String,
}

impl fmt::Display for InvalidStatic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}.{}' {}", self.node_id, self.port, self.reason)
    }
}

/// An edge whose endpoint port types are incompatible.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("edge '{edge_id}' expects {expected}, got {actual}")]
pub struct TypeMismatch {
    pub edge_id: String,
    /// Type of the target input port.
    pub expected: PortType,
    /// Type of the source output port.
    pub actual: PortType,
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

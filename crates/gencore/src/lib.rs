//! Core abstractions for the generation workflow engine
//!
//! Workflow graphs, typed ports, runtime values, node handler contracts,
//! progress events and generation records. Every other crate depends on
//! these types; execution itself lives in `genruntime`.

mod error;
pub mod events;
mod node;
mod port;
pub mod record;
mod value;
mod workflow;

pub use error::{
    DanglingEdge, DanglingReason, FanIn, FlowError, InvalidStatic, MissingInput, NodeError,
    RecordError, RunError, TypeMismatch, UnknownNodeType, ValidationError, WorkflowError,
};
pub use events::*;
pub use node::{
    MediaMetadata, NodeCategory, NodeContext, NodeHandler, NodeMetadata, NodeOutput, NodeType,
    TypeRegistry,
};
pub use port::{PortDefinition, PortType};
pub use record::{GenerationRecord, GenerationStats, RecordMetrics, RecordSink};
pub use value::{MediaKind, MediaRef, Value};
pub use workflow::{
    NodeId, Position, RetryPolicy, StaticInputs, Workflow, WorkflowEdge, WorkflowId, WorkflowNode,
};

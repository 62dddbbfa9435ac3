//! Workflow execution runtime
//!
//! Validation, type checking and planning of workflow graphs, and the
//! coordinator that runs them: dispatching handlers concurrently, emitting
//! ordered progress updates and recording every invocation.

mod emitter;
mod executor;
mod graph;
mod planner;
mod recorder;
mod registry;
mod runtime;
mod state;
mod typecheck;
mod validator;

pub use emitter::ProgressEmitter;
pub use executor::RunCoordinator;
pub use graph::DependencyGraph;
pub use planner::{plan, ExecutionPlan};
pub use recorder::{
    GenerationRecorder, MemoryRecordSink, NullRecordSink, RecordFailure, RecorderOutcome,
};
pub use registry::NodeRegistry;
pub use runtime::{Engine, EngineConfig};
pub use state::{NodeSummary, RunReport, RunSummary};
pub use typecheck::check_types;
pub use validator::validate;

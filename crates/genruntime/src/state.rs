use crate::recorder::RecordFailure;
use chrono::{DateTime, Utc};
use gencore::{
    GenerationRecord, NodeId, NodeStatus, ProgressUpdate, RunId, RunStatus, Value, WorkflowId,
};
use serde::Serialize;
use std::collections::HashMap;

/// One slot of the run-state arena. Owned by the coordinator; node tasks
/// never touch it.
#[derive(Debug, Clone)]
pub(crate) struct NodeCell {
    pub status: NodeStatus,
    pub inputs: HashMap<String, Value>,
    pub outputs: HashMap<String, Value>,
    pub error: Option<String>,
    pub latency_ms: Option<u64>,
    pub attempts: u32,
}

impl NodeCell {
    pub fn pending() -> Self {
        Self {
            status: NodeStatus::Pending,
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            error: None,
            latency_ms: None,
            attempts: 0,
        }
    }
}

/// Point-in-time view of a run.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: RunId,
    pub workflow_id: WorkflowId,
    pub status: RunStatus,
    pub nodes: Vec<NodeSummary>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn node(&self, node_id: &str) -> Option<&NodeSummary> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    pub fn count(&self, status: NodeStatus) -> usize {
        self.nodes.iter().filter(|n| n.status == status).count()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
    pub node_id: NodeId,
    pub node_type: String,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub outputs: HashMap<String, Value>,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub summary: RunSummary,
    /// Full progress stream, in emission order.
    pub progress: Vec<ProgressUpdate>,
    pub records: Vec<GenerationRecord>,
    /// Records the sink failed to store. Each is also listed in `records`.
    pub record_failures: Vec<RecordFailure>,
}

impl RunReport {
    pub fn run_id(&self) -> RunId {
        self.summary.run_id
    }

    pub fn status(&self) -> RunStatus {
        self.summary.status
    }

    pub fn node_status(&self, node_id: &str) -> Option<NodeStatus> {
        self.summary.node(node_id).map(|n| n.status)
    }

    pub fn outputs(&self, node_id: &str) -> Option<&HashMap<String, Value>> {
        self.summary.node(node_id).map(|n| &n.outputs)
    }

    /// Progress updates of one node, in order.
    pub fn updates_for(&self, node_id: &str) -> Vec<&ProgressUpdate> {
        self.progress.iter().filter(|u| u.node_id == node_id).collect()
    }

    pub fn records_for(&self, node_id: &str) -> Vec<&GenerationRecord> {
        self.records.iter().filter(|r| r.node_id == node_id).collect()
    }

    /// Sequence number of a node's update with the given status.
    pub fn sequence_of(&self, node_id: &str, status: NodeStatus) -> Option<u64> {
        self.progress
            .iter()
            .find(|u| u.node_id == node_id && u.status == status)
            .map(|u| u.sequence)
    }
}

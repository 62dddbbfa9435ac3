use crate::{NodeId, RunId, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Status of a node within one run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Running,
    Completed,
    Error,
    Cancelled,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeStatus::Completed | NodeStatus::Error | NodeStatus::Cancelled
        )
    }

    /// `pending -> running -> {completed | error | cancelled}` and
    /// `pending -> cancelled`. Nothing leaves a terminal state.
    pub fn can_transition_to(self, next: NodeStatus) -> bool {
        match (self, next) {
            (NodeStatus::Pending, NodeStatus::Running | NodeStatus::Cancelled) => true,
            (
                NodeStatus::Running,
                NodeStatus::Completed | NodeStatus::Error | NodeStatus::Cancelled,
            ) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Running => "running",
            NodeStatus::Completed => "completed",
            NodeStatus::Error => "error",
            NodeStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a run as a whole.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Error,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    /// Terminal status of a run whose nodes are all terminal: `error` if any
    /// node errored, else `cancelled` if any was cancelled, else `completed`.
    pub fn from_nodes<I>(statuses: I) -> RunStatus
    where
        I: IntoIterator<Item = NodeStatus>,
    {
        let mut status = RunStatus::Completed;
        for node in statuses {
            match node {
                NodeStatus::Error => return RunStatus::Error,
                NodeStatus::Cancelled => status = RunStatus::Cancelled,
                _ => {}
            }
        }
        status
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
            RunStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One node status transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub run_id: RunId,
    /// Position in the run's progress stream, starting at 0.
    pub sequence: u64,
    pub node_id: NodeId,
    pub status: NodeStatus,
    pub data: ProgressData,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<HashMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressData {
    pub fn completed(latency_ms: u64, outputs: HashMap<String, Value>) -> Self {
        Self {
            latency_ms: Some(latency_ms),
            outputs: Some(outputs),
            error: None,
        }
    }

    pub fn failed(latency_ms: u64, error: impl Into<String>) -> Self {
        Self {
            latency_ms: Some(latency_ms),
            outputs: None,
            error: Some(error.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.latency_ms.is_none() && self.outputs.is_none() && self.error.is_none()
    }
}

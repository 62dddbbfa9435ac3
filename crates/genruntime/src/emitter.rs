use chrono::Utc;
use gencore::{
    EventBus, ExecutionEvent, NodeId, NodeStatus, ProgressData, ProgressUpdate, RunId, RunStatus,
    WorkflowId,
};
use std::sync::Arc;

/// Turns coordinator transitions into the run's ordered progress stream.
///
/// Every update is appended to the run's log and published on the event bus.
/// Sequence numbers are assigned here, so the log order is the order in
/// which the coordinator observed the transitions.
pub struct ProgressEmitter {
    run_id: RunId,
    bus: Arc<EventBus>,
    log: Vec<ProgressUpdate>,
}

impl ProgressEmitter {
    pub fn new(run_id: RunId, bus: Arc<EventBus>) -> Self {
        Self {
            run_id,
            bus,
            log: Vec::new(),
        }
    }

    pub fn run_started(&self, workflow_id: WorkflowId, node_count: usize) {
        self.bus.emit(ExecutionEvent::RunStarted {
            run_id: self.run_id,
            workflow_id,
            node_count,
            timestamp: Utc::now(),
        });
    }

    pub fn node_transition(&mut self, node_id: &NodeId, status: NodeStatus, data: ProgressData) {
        let update = ProgressUpdate {
            run_id: self.run_id,
            sequence: self.log.len() as u64,
            node_id: node_id.clone(),
            status,
            data,
            timestamp: Utc::now(),
        };
        self.bus.emit(ExecutionEvent::NodeProgress(update.clone()));
        self.log.push(update);
    }

    pub fn run_finished(&self, status: RunStatus, duration_ms: u64) {
        self.bus.emit(ExecutionEvent::RunFinished {
            run_id: self.run_id,
            status,
            duration_ms,
            timestamp: Utc::now(),
        });
    }

    pub fn into_log(self) -> Vec<ProgressUpdate> {
        self.log
    }
}

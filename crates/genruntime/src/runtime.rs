use crate::executor::RunCoordinator;
use crate::planner::{self, ExecutionPlan};
use crate::recorder::NullRecordSink;
use crate::registry::NodeRegistry;
use crate::state::{RunReport, RunSummary};
use crate::{typecheck, validator};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use gencore::{
    EventBus, ExecutionEvent, FlowError, RecordSink, RunError, RunId, StaticInputs, Workflow,
    WorkflowId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

type ReportFuture = Shared<BoxFuture<'static, Result<RunReport, String>>>;

struct RunHandle {
    workflow_id: WorkflowId,
    cancel: CancellationToken,
    status: watch::Receiver<RunSummary>,
    report: ReportFuture,
}

/// Main entry point for validating and running workflows.
///
/// Any number of runs may be active at once; each owns independent state and
/// is addressed by its run id. Finished runs stay queryable until pruned:
/// every `start_run` keeps at most `max_finished_runs` of them, dropping the
/// oldest first, and [`Engine::prune_finished`] drops them all.
pub struct Engine {
    registry: Arc<NodeRegistry>,
    config: EngineConfig,
    event_bus: Arc<EventBus>,
    record_sink: Arc<dyn RecordSink>,
    runs: Arc<RwLock<HashMap<RunId, RunHandle>>>,
}

impl Engine {
    /// Create an engine with default settings
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    pub fn with_config(registry: Arc<NodeRegistry>, config: EngineConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        Self {
            registry,
            config,
            event_bus,
            record_sink: Arc::new(NullRecordSink),
            runs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Send generation records of every subsequent run to `sink`.
    pub fn with_record_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.record_sink = sink;
        self
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subscribe to execution events of all runs
    pub fn subscribe_events(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Validate, type-check and plan a workflow without running it.
    pub fn validate(&self, workflow: &Workflow) -> Result<ExecutionPlan, FlowError> {
        validator::validate(workflow, self.registry.as_ref())?;
        typecheck::check_types(workflow, self.registry.as_ref())?;
        Ok(planner::plan(workflow))
    }

    /// Create a run and start executing it in the background.
    ///
    /// `static_inputs` overrides node static values for this run only. No run
    /// is created, and nothing is emitted, if the workflow fails validation or
    /// type checking.
    pub async fn start_run(
        &self,
        workflow: &Workflow,
        static_inputs: &StaticInputs,
    ) -> Result<RunId, FlowError> {
        let workflow = workflow.clone().with_static_inputs(static_inputs);
        let plan = self.validate(&workflow)?;

        let run_id = Uuid::new_v4();
        let workflow_id = workflow.id;
        let cancel = CancellationToken::new();
        let (coordinator, status) = RunCoordinator::new(
            run_id,
            workflow,
            plan,
            &self.registry,
            Arc::clone(&self.event_bus),
            Arc::clone(&self.record_sink),
            &self.config,
            cancel.clone(),
        )?;

        self.prune_oldest_finished().await;

        let task = tokio::spawn(coordinator.run());
        let report = task
            .map(|joined| joined.map_err(|e| e.to_string()))
            .boxed()
            .shared();

        self.runs.write().await.insert(
            run_id,
            RunHandle {
                workflow_id,
                cancel,
                status,
                report,
            },
        );

        tracing::info!("Created run {} for workflow {}", run_id, workflow_id);
        Ok(run_id)
    }

    /// Request cancellation. Pending nodes are skipped; running handlers see
    /// their cancellation token fire. Cancelling a finished run has no effect.
    pub async fn cancel_run(&self, run_id: RunId) -> Result<(), FlowError> {
        let runs = self.runs.read().await;
        let handle = runs.get(&run_id).ok_or(RunError::NotFound(run_id))?;
        tracing::info!("Cancelling run {}", run_id);
        handle.cancel.cancel();
        Ok(())
    }

    /// Latest snapshot of a run.
    pub async fn run_status(&self, run_id: RunId) -> Result<RunSummary, FlowError> {
        let runs = self.runs.read().await;
        let handle = runs.get(&run_id).ok_or(RunError::NotFound(run_id))?;
        let summary = handle.status.borrow().clone();
        Ok(summary)
    }

    /// Wait for a run to reach a terminal status. Any number of callers may
    /// wait on the same run.
    pub async fn wait_for_run(&self, run_id: RunId) -> Result<RunReport, FlowError> {
        let report = {
            let runs = self.runs.read().await;
            runs.get(&run_id)
                .ok_or(RunError::NotFound(run_id))?
                .report
                .clone()
        };

        report
            .await
            .map_err(|reason| RunError::Aborted { run_id, reason }.into())
    }

    /// Start a run and wait for it to finish.
    pub async fn execute(
        &self,
        workflow: &Workflow,
        static_inputs: &StaticInputs,
    ) -> Result<RunReport, FlowError> {
        let run_id = self.start_run(workflow, static_inputs).await?;
        self.wait_for_run(run_id).await
    }

    /// Runs of a workflow known to the engine.
    pub async fn runs_of(&self, workflow_id: WorkflowId) -> Vec<RunId> {
        self.runs
            .read()
            .await
            .iter()
            .filter(|(_, h)| h.workflow_id == workflow_id)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Drop the state of every finished run. Returns how many were removed.
    pub async fn prune_finished(&self) -> usize {
        let mut runs = self.runs.write().await;
        let before = runs.len();
        runs.retain(|_, h| !h.status.borrow().is_terminal());
        let pruned = before - runs.len();
        if pruned > 0 {
            tracing::debug!("Pruned {} finished runs", pruned);
        }
        pruned
    }

    async fn prune_oldest_finished(&self) {
        let mut runs = self.runs.write().await;
        let mut finished: Vec<(RunId, DateTime<Utc>)> = runs
            .iter()
            .filter_map(|(id, h)| {
                let summary = h.status.borrow();
                summary.is_terminal().then_some((*id, summary.started_at))
            })
            .collect();
        if finished.len() <= self.config.max_finished_runs {
            return;
        }
        finished.sort_by_key(|(_, started_at)| *started_at);
        let excess = finished.len() - self.config.max_finished_runs;
        for (id, _) in finished.into_iter().take(excess) {
            runs.remove(&id);
        }
        tracing::debug!("Dropped {} oldest finished runs", excess);
    }
}

/// Configuration for the engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Upper bound on handlers running at once within a run.
    pub max_concurrent_nodes: usize,
    pub event_buffer_size: usize,
    /// Per-invocation handler timeout. `None` waits indefinitely.
    pub node_timeout_ms: Option<u64>,
    /// Finished runs kept for status queries before the oldest are dropped.
    pub max_finished_runs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_nodes: 10,
            event_buffer_size: 1000,
            node_timeout_ms: None,
            max_finished_runs: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_fills_missing_fields() {
        let config: EngineConfig = serde_json::from_str(r#"{"maxConcurrentNodes": 2}"#).unwrap();
        assert_eq!(config.max_concurrent_nodes, 2);
        assert_eq!(config.event_buffer_size, 1000);
        assert_eq!(config.node_timeout_ms, None);
        assert_eq!(config.max_finished_runs, 100);
    }
}

use crate::emitter::ProgressEmitter;
use crate::graph::DependencyGraph;
use crate::planner::ExecutionPlan;
use crate::recorder::GenerationRecorder;
use crate::registry::NodeRegistry;
use crate::runtime::EngineConfig;
use crate::state::{NodeCell, NodeSummary, RunReport, RunSummary};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use gencore::{
    EventBus, FlowError, GenerationRecord, NodeContext, NodeError, NodeHandler, NodeMetadata,
    NodeOutput, NodeStatus, NodeType, ProgressData, RecordMetrics, RecordSink, RetryPolicy, RunId,
    RunStatus, TypeRegistry, Value, Workflow,
};
use petgraph::graph::NodeIndex;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// Message a node task sends back when its handler is done.
struct NodeCompletion {
    index: NodeIndex,
    result: Result<NodeOutput, NodeError>,
    latency_ms: u64,
    attempts: u32,
}

/// Drives one run from start to finish.
///
/// The coordinator is the only writer of the run state. Handlers run in
/// spawned tasks and report back over a single completion channel, so status
/// transitions and their progress updates happen in exactly one place.
pub struct RunCoordinator {
    run_id: RunId,
    workflow: Workflow,
    graph: DependencyGraph,
    plan: ExecutionPlan,
    /// Arena indices in plan order; nodes left out of the plan go last.
    order: Vec<NodeIndex>,
    position: Vec<usize>,
    cells: Vec<NodeCell>,
    definitions: Vec<NodeType>,
    handlers: Vec<Arc<dyn NodeHandler>>,
    max_concurrent: usize,
    node_timeout_ms: Option<u64>,
    bus: Arc<EventBus>,
    sink: Arc<dyn RecordSink>,
    emitter: ProgressEmitter,
    cancel: CancellationToken,
    status_tx: watch::Sender<RunSummary>,
    started_at: DateTime<Utc>,
}

impl RunCoordinator {
    /// Prepare a run of a validated workflow. Fails when a node type has no
    /// handler, before anything is emitted.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: RunId,
        workflow: Workflow,
        plan: ExecutionPlan,
        registry: &NodeRegistry,
        bus: Arc<EventBus>,
        sink: Arc<dyn RecordSink>,
        config: &EngineConfig,
        cancel: CancellationToken,
    ) -> Result<(Self, watch::Receiver<RunSummary>), FlowError> {
        let graph = DependencyGraph::from_workflow(&workflow);

        let mut definitions = Vec::with_capacity(workflow.nodes.len());
        let mut handlers = Vec::with_capacity(workflow.nodes.len());
        for node in &workflow.nodes {
            let handler = registry.handler(&node.node_type)?;
            let definition = registry
                .lookup(&node.node_type)
                .cloned()
                .unwrap_or_else(|| handler.definition());
            definitions.push(definition);
            handlers.push(handler);
        }

        let mut order: Vec<NodeIndex> = plan
            .nodes()
            .filter_map(|id| graph.index_of(id))
            .collect();
        for idx in graph.indices() {
            if !order.contains(&idx) {
                order.push(idx);
            }
        }
        let mut position = vec![0; order.len()];
        for (pos, idx) in order.iter().enumerate() {
            position[idx.index()] = pos;
        }

        let cells = vec![NodeCell::pending(); workflow.nodes.len()];
        let emitter = ProgressEmitter::new(run_id, Arc::clone(&bus));
        let started_at = Utc::now();
        let (status_tx, status_rx) = watch::channel(snapshot(
            run_id,
            &workflow,
            &cells,
            RunStatus::Running,
            started_at,
            None,
        ));

        let coordinator = Self {
            run_id,
            workflow,
            graph,
            plan,
            order,
            position,
            cells,
            definitions,
            handlers,
            max_concurrent: config.max_concurrent_nodes.max(1),
            node_timeout_ms: config.node_timeout_ms,
            bus,
            sink,
            emitter,
            cancel,
            status_tx,
            started_at,
        };

        Ok((coordinator, status_rx))
    }

    /// Execute every node the plan allows and return the final report.
    pub async fn run(mut self) -> RunReport {
        let start = Instant::now();
        let mut recorder = GenerationRecorder::spawn(self.run_id, Arc::clone(&self.sink));
        let (tx, mut rx) = mpsc::unbounded_channel::<NodeCompletion>();
        let cancel = self.cancel.clone();

        tracing::info!(
            "Starting run {} of workflow '{}' ({} nodes, {} layers)",
            self.run_id,
            self.workflow.name,
            self.workflow.nodes.len(),
            self.plan.depth()
        );
        self.emitter.run_started(self.workflow.id, self.workflow.nodes.len());

        let mut running = 0usize;
        let mut cancelled = false;

        loop {
            if cancel.is_cancelled() && !cancelled {
                cancelled = true;
                tracing::info!("Run {} cancelled, skipping pending nodes", self.run_id);
                self.cancel_pending();
            }

            if !cancelled {
                running += self.dispatch_ready(&tx, running);
            }

            if running == 0 {
                break;
            }

            tokio::select! {
                Some(done) = rx.recv() => {
                    running -= 1;
                    if let Err(e) = self.complete(done, &mut recorder) {
                        tracing::error!("Run {}: {}", self.run_id, e);
                    }
                }
                _ = cancel.cancelled(), if !cancelled => {}
            }
        }

        // Only reachable with nodes that could never become ready.
        self.cancel_pending();

        let recorded = recorder.finish().await;
        let status = RunStatus::from_nodes(self.cells.iter().map(|c| c.status));
        let duration_ms = start.elapsed().as_millis() as u64;
        let summary = self.summary(status, Some(Utc::now()));
        self.status_tx.send_replace(summary.clone());
        self.emitter.run_finished(status, duration_ms);

        tracing::info!("Run {} finished {} in {}ms", self.run_id, status, duration_ms);
        if !recorded.failures.is_empty() {
            tracing::warn!(
                "Run {}: {} of {} generation records were not stored",
                self.run_id,
                recorded.failures.len(),
                recorded.records.len()
            );
        }

        RunReport {
            summary,
            progress: self.emitter.into_log(),
            records: recorded.records,
            record_failures: recorded.failures,
        }
    }

    /// Start pending nodes whose dependencies have all completed, in plan
    /// order, without exceeding the concurrency limit. Returns how many
    /// were started.
    fn dispatch_ready(&mut self, tx: &mpsc::UnboundedSender<NodeCompletion>, running: usize) -> usize {
        let mut started = 0;
        for pos in 0..self.order.len() {
            if running + started >= self.max_concurrent {
                break;
            }
            let idx = self.order[pos];
            if self.cells[idx.index()].status != NodeStatus::Pending {
                continue;
            }
            let ready = self
                .graph
                .dependencies(idx)
                .iter()
                .all(|dep| self.cells[dep.index()].status == NodeStatus::Completed);
            if !ready {
                continue;
            }
            match self.dispatch(idx, tx) {
                Ok(()) => started += 1,
                Err(e) => tracing::error!("Run {}: {}", self.run_id, e),
            }
        }
        started
    }

    fn dispatch(
        &mut self,
        idx: NodeIndex,
        tx: &mpsc::UnboundedSender<NodeCompletion>,
    ) -> Result<(), FlowError> {
        let inputs = self.assemble_inputs(idx);
        self.transition(idx, NodeStatus::Running, ProgressData::default())?;
        self.cells[idx.index()].inputs = inputs.clone();

        let node = &self.workflow.nodes[idx.index()];
        tracing::debug!("Dispatching node {} ({})", node.id, node.node_type);

        let ctx = NodeContext {
            run_id: self.run_id,
            node_id: node.id.clone(),
            inputs,
            events: self.bus.create_emitter(self.run_id, node.id.clone()),
            cancellation: self.cancel.child_token(),
        };
        let handler = Arc::clone(&self.handlers[idx.index()]);
        let retry = node.retry.clone();
        let timeout_ms = self.node_timeout_ms;
        let tx = tx.clone();

        tokio::spawn(async move {
            let start = Instant::now();
            let (result, attempts) = invoke_node(handler, ctx, retry, timeout_ms).await;
            let completion = NodeCompletion {
                index: idx,
                result,
                latency_ms: start.elapsed().as_millis() as u64,
                attempts,
            };
            if tx.send(completion).is_err() {
                tracing::warn!("Run coordinator gone before node {} reported", idx.index());
            }
        });

        Ok(())
    }

    /// Resolve a node's inputs: an incoming edge supplies the upstream output,
    /// otherwise the static value, otherwise the port default. Unset optional
    /// inputs stay absent.
    fn assemble_inputs(&self, idx: NodeIndex) -> HashMap<String, Value> {
        let node = &self.workflow.nodes[idx.index()];
        let mut inputs = HashMap::new();

        for port in &self.definitions[idx.index()].inputs {
            let edge = self.workflow.incoming(&node.id).find(|e| e.target_handle == port.name);

            let value = match edge {
                Some(edge) => {
                    if node.static_value(&port.name).is_some() {
                        tracing::debug!(
                            "Node {} input '{}' is connected; ignoring its static value",
                            node.id,
                            port.name
                        );
                    }
                    self.graph
                        .index_of(&edge.source)
                        .and_then(|src| self.cells[src.index()].outputs.get(&edge.source_handle))
                        .cloned()
                }
                None => node
                    .static_value(&port.name)
                    .cloned()
                    .or_else(|| port.default.clone()),
            };

            if let Some(value) = value {
                inputs.insert(port.name.clone(), value);
            }
        }

        inputs
    }

    fn complete(
        &mut self,
        done: NodeCompletion,
        recorder: &mut GenerationRecorder,
    ) -> Result<(), FlowError> {
        let idx = done.index;
        let node_id = self.workflow.nodes[idx.index()].id.clone();
        {
            let cell = &mut self.cells[idx.index()];
            cell.latency_ms = Some(done.latency_ms);
            cell.attempts = done.attempts;
        }

        let result = done.result.and_then(|output| self.check_outputs(idx, output));

        match result {
            Ok(output) => {
                tracing::info!("Node {} completed in {}ms", node_id, done.latency_ms);
                self.cells[idx.index()].outputs = output.outputs.clone();
                self.transition(
                    idx,
                    NodeStatus::Completed,
                    ProgressData::completed(done.latency_ms, output.outputs),
                )?;
                let record = self.build_record(idx, NodeStatus::Completed, output.metadata);
                recorder.record(record)?;
            }
            Err(NodeError::Cancelled) => {
                tracing::info!("Node {} cancelled", node_id);
                self.transition(
                    idx,
                    NodeStatus::Cancelled,
                    ProgressData {
                        latency_ms: Some(done.latency_ms),
                        ..ProgressData::default()
                    },
                )?;
                let record = self.build_record(idx, NodeStatus::Cancelled, NodeMetadata::default());
                self.cancel_dependents(idx);
                recorder.record(record)?;
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!("Node {} failed: {}", node_id, message);
                self.cells[idx.index()].error = Some(message.clone());
                self.transition(
                    idx,
                    NodeStatus::Error,
                    ProgressData::failed(done.latency_ms, message),
                )?;
                let record = self.build_record(idx, NodeStatus::Error, NodeMetadata::default());
                self.cancel_dependents(idx);
                recorder.record(record)?;
            }
        }

        Ok(())
    }

    /// Keep only declared outputs, and require every kept value to conform
    /// to its port type and every output feeding an edge to be present.
    fn check_outputs(&self, idx: NodeIndex, output: NodeOutput) -> Result<NodeOutput, NodeError> {
        let definition = &self.definitions[idx.index()];
        let node_id = &self.workflow.nodes[idx.index()].id;

        let mut produced: Vec<(String, Value)> = output.outputs.into_iter().collect();
        produced.sort_by(|a, b| a.0.cmp(&b.0));

        let mut kept = HashMap::new();
        for (port, value) in produced {
            let Some(def) = definition.output(&port) else {
                tracing::warn!("Node {} produced undeclared output '{}', dropping it", node_id, port);
                continue;
            };
            if !value.conforms_to(def.port_type) {
                return Err(NodeError::InvalidOutputType {
                    port,
                    expected: def.port_type,
                    actual: value.kind_name().to_string(),
                });
            }
            kept.insert(port, value);
        }

        for edge in self.workflow.edges.iter().filter(|e| &e.source == node_id) {
            if !kept.contains_key(&edge.source_handle) {
                return Err(NodeError::MissingOutput(edge.source_handle.clone()));
            }
        }

        Ok(NodeOutput {
            outputs: kept,
            metadata: output.metadata,
        })
    }

    /// Cancel every pending node downstream of `idx`, in plan order.
    fn cancel_dependents(&mut self, idx: NodeIndex) {
        let mut downstream = self.graph.transitive_dependents(idx);
        downstream.sort_by_key(|d| self.position[d.index()]);
        for dep in downstream {
            self.skip(dep);
        }
    }

    /// Cancel every node still pending, in plan order.
    fn cancel_pending(&mut self) {
        for pos in 0..self.order.len() {
            self.skip(self.order[pos]);
        }
    }

    fn skip(&mut self, idx: NodeIndex) {
        if self.cells[idx.index()].status != NodeStatus::Pending {
            return;
        }
        if let Err(e) = self.transition(idx, NodeStatus::Cancelled, ProgressData::default()) {
            tracing::error!("Run {}: {}", self.run_id, e);
        } else {
            tracing::debug!("Node {} cancelled without running", self.workflow.nodes[idx.index()].id);
        }
    }

    fn transition(
        &mut self,
        idx: NodeIndex,
        to: NodeStatus,
        data: ProgressData,
    ) -> Result<(), FlowError> {
        let node_id = &self.workflow.nodes[idx.index()].id;
        let cell = &mut self.cells[idx.index()];
        if !cell.status.can_transition_to(to) {
            return Err(FlowError::InvalidTransition {
                node_id: node_id.clone(),
                from: cell.status,
                to,
            });
        }
        cell.status = to;
        self.emitter.node_transition(node_id, to, data);

        let snapshot = self.summary(RunStatus::Running, None);
        self.status_tx.send_replace(snapshot);
        Ok(())
    }

    fn build_record(&self, idx: NodeIndex, status: NodeStatus, metadata: NodeMetadata) -> GenerationRecord {
        let node = &self.workflow.nodes[idx.index()];
        let definition = &self.definitions[idx.index()];
        let cell = &self.cells[idx.index()];

        GenerationRecord {
            id: GenerationRecord::new_id(),
            run_id: self.run_id,
            workflow_id: self.workflow.id,
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
            timestamp: Utc::now(),
            provider: metadata.provider.unwrap_or_else(|| "unknown".to_string()),
            model: metadata.model.unwrap_or_else(|| "unknown".to_string()),
            category: definition.category,
            status,
            attempts: cell.attempts,
            input: cell.inputs.clone(),
            output: cell.outputs.clone(),
            error: cell.error.clone(),
            metrics: RecordMetrics {
                latency_ms: cell.latency_ms.unwrap_or(0),
                cost_usd: metadata.cost_usd,
            },
            media_meta: metadata.media,
        }
    }

    fn summary(&self, status: RunStatus, finished_at: Option<DateTime<Utc>>) -> RunSummary {
        snapshot(
            self.run_id,
            &self.workflow,
            &self.cells,
            status,
            self.started_at,
            finished_at,
        )
    }
}

fn snapshot(
    run_id: RunId,
    workflow: &Workflow,
    cells: &[NodeCell],
    status: RunStatus,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
) -> RunSummary {
    let nodes = workflow
        .nodes
        .iter()
        .zip(cells)
        .map(|(node, cell)| NodeSummary {
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
            status: cell.status,
            latency_ms: cell.latency_ms,
            error: cell.error.clone(),
            outputs: cell.outputs.clone(),
        })
        .collect();

    RunSummary {
        run_id,
        workflow_id: workflow.id,
        status,
        nodes,
        started_at,
        finished_at,
    }
}

/// Invoke a handler, retrying per its policy. Cancellation is never
/// retried. Returns the final result and the number of attempts made.
async fn invoke_node(
    handler: Arc<dyn NodeHandler>,
    ctx: NodeContext,
    retry: Option<RetryPolicy>,
    timeout_ms: Option<u64>,
) -> (Result<NodeOutput, NodeError>, u32) {
    let max_attempts = retry.as_ref().map(|r| r.max_attempts.max(1)).unwrap_or(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = invoke_once(handler.as_ref(), ctx.clone(), timeout_ms).await;

        let retryable = matches!(&result, Err(e) if !e.is_cancelled())
            && attempt < max_attempts
            && !ctx.is_cancelled();
        if !retryable {
            return (result, attempt);
        }

        let delay = retry.as_ref().map(|r| r.delay_after(attempt)).unwrap_or(0);
        if let Err(e) = &result {
            tracing::warn!(
                "Node {} attempt {}/{} failed: {}; retrying in {}ms",
                ctx.node_id,
                attempt,
                max_attempts,
                e,
                delay
            );
        }

        tokio::select! {
            _ = ctx.cancellation.cancelled() => return (Err(NodeError::Cancelled), attempt),
            _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
        }
    }
}

async fn invoke_once(
    handler: &dyn NodeHandler,
    ctx: NodeContext,
    timeout_ms: Option<u64>,
) -> Result<NodeOutput, NodeError> {
    let call = AssertUnwindSafe(handler.invoke(ctx)).catch_unwind();

    let outcome = match timeout_ms {
        Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), call).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(NodeError::Timeout { ms }),
        },
        None => call.await,
    };

    outcome.unwrap_or_else(|payload| {
        Err(NodeError::ExecutionFailed(format!(
            "handler panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

use crate::graph::DependencyGraph;
use gencore::{NodeId, Workflow};
use serde::Serialize;

/// Layered execution order. Every node's dependencies sit in strictly
/// earlier layers; nodes within a layer are independent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    layers: Vec<Vec<NodeId>>,
}

impl ExecutionPlan {
    pub fn layers(&self) -> &[Vec<NodeId>] {
        &self.layers
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    pub fn node_count(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }

    /// Nodes in plan order: layer by layer, insertion order within a layer.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.layers.iter().flatten()
    }

    pub fn layer_of(&self, node_id: &str) -> Option<usize> {
        self.layers
            .iter()
            .position(|layer| layer.iter().any(|id| id == node_id))
    }
}

/// Derive the execution plan of a validated workflow with a layered Kahn's
/// algorithm. Within a layer, nodes keep their workflow insertion order.
pub fn plan(workflow: &Workflow) -> ExecutionPlan {
    plan_graph(&DependencyGraph::from_workflow(workflow))
}

pub(crate) fn plan_graph(graph: &DependencyGraph) -> ExecutionPlan {
    let mut in_degree: Vec<usize> = graph
        .indices()
        .map(|idx| graph.dependencies(idx).len())
        .collect();

    let mut layers = Vec::new();
    let mut current: Vec<_> = graph.indices().filter(|idx| in_degree[idx.index()] == 0).collect();
    let mut planned = 0;

    while !current.is_empty() {
        planned += current.len();
        let mut next = Vec::new();
        for &idx in &current {
            for dependent in graph.dependents(idx) {
                let degree = &mut in_degree[dependent.index()];
                *degree -= 1;
                if *degree == 0 {
                    next.push(dependent);
                }
            }
        }
        next.sort();
        layers.push(current.iter().map(|&idx| graph.node_id(idx).clone()).collect());
        current = next;
    }

    if planned < graph.len() {
        tracing::error!(
            "{} nodes are part of or behind a cycle and were left out of the plan",
            graph.len() - planned
        );
    }

    ExecutionPlan { layers }
}

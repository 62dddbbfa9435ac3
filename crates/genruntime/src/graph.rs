//! Node-level dependency graph derived from a workflow's edges.

use gencore::{NodeId, Workflow};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use petgraph::Direction;
use std::collections::HashMap;

/// Dependency relation between workflow nodes.
///
/// Graph node `i` is `workflow.nodes[i]`, so node indices double as arena
/// slots and their order is the workflow's insertion order. Parallel edges
/// between the same pair of nodes collapse into one dependency. Edges with an
/// unknown endpoint are left out.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<NodeId, ()>,
    index: HashMap<NodeId, NodeIndex>,
}

impl DependencyGraph {
    pub fn from_workflow(workflow: &Workflow) -> Self {
        let mut graph = DiGraph::with_capacity(workflow.nodes.len(), workflow.edges.len());
        let mut index = HashMap::with_capacity(workflow.nodes.len());

        for node in &workflow.nodes {
            let idx = graph.add_node(node.id.clone());
            index.entry(node.id.clone()).or_insert(idx);
        }

        for edge in &workflow.edges {
            if let (Some(&from), Some(&to)) = (index.get(&edge.source), index.get(&edge.target)) {
                graph.update_edge(from, to, ());
            }
        }

        Self { graph, index }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn index_of(&self, node_id: &str) -> Option<NodeIndex> {
        self.index.get(node_id).copied()
    }

    pub fn node_id(&self, idx: NodeIndex) -> &NodeId {
        &self.graph[idx]
    }

    /// All node indices in insertion order.
    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> {
        (0..self.graph.node_count()).map(NodeIndex::new)
    }

    /// Direct upstream nodes, in insertion order.
    pub fn dependencies(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors(idx, Direction::Incoming)
    }

    /// Direct downstream nodes, in insertion order.
    pub fn dependents(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors(idx, Direction::Outgoing)
    }

    /// Every node reachable downstream of `idx`, excluding `idx`, in
    /// insertion order.
    pub fn transitive_dependents(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut dfs = Dfs::new(&self.graph, idx);
        let mut reached = Vec::new();
        while let Some(next) = dfs.next(&self.graph) {
            if next != idx {
                reached.push(next);
            }
        }
        reached.sort();
        reached
    }

    /// One cycle of the dependency relation, if any, found by iterative
    /// depth-first search with three-color marking. In the returned sequence
    /// every node has an edge to the next, and the last has an edge to the
    /// first.
    pub fn find_cycle(&self) -> Option<Vec<NodeId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Gray,
            Black,
        }

        let mut marks = vec![Mark::White; self.len()];
        let mut path: Vec<NodeIndex> = Vec::new();

        for root in self.indices() {
            if marks[root.index()] != Mark::White {
                continue;
            }
            marks[root.index()] = Mark::Gray;
            path.push(root);
            let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize)> =
                vec![(root, self.dependents(root), 0)];

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                let next = frame.1.get(frame.2).copied();
                frame.2 += 1;

                let Some(next) = next else {
                    marks[node.index()] = Mark::Black;
                    path.pop();
                    stack.pop();
                    continue;
                };

                match marks[next.index()] {
                    Mark::White => {
                        marks[next.index()] = Mark::Gray;
                        path.push(next);
                        stack.push((next, self.dependents(next), 0));
                    }
                    Mark::Gray => {
                        let start = path.iter().position(|&p| p == next).unwrap_or(0);
                        return Some(path[start..].iter().map(|&i| self.graph[i].clone()).collect());
                    }
                    Mark::Black => {}
                }
            }
        }

        None
    }

    fn neighbors(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self.graph.neighbors_directed(idx, direction).collect();
        out.sort();
        out.dedup();
        out
    }
}

use gencore::{Workflow, WorkflowNode};
use genruntime::plan;
use std::collections::HashSet;

fn workflow(nodes: &[&str], edges: &[(&str, &str)]) -> Workflow {
    let mut w = Workflow::new("plan");
    for id in nodes {
        w.add_node(WorkflowNode::new(*id, "t"));
    }
    for (i, (from, to)) in edges.iter().enumerate() {
        w.connect(*from, "out", *to, format!("in{}", i));
    }
    w
}

fn layers(w: &Workflow) -> Vec<Vec<String>> {
    plan(w).layers().to_vec()
}

#[test]
fn test_single_node_single_layer() {
    let w = workflow(&["only"], &[]);
    assert_eq!(layers(&w), vec![vec!["only".to_string()]]);
}

#[test]
fn test_empty_workflow_has_no_layers() {
    let w = workflow(&[], &[]);
    assert_eq!(plan(&w).depth(), 0);
}

#[test]
fn test_diamond_layers() {
    let w = workflow(
        &["a", "b", "c", "d"],
        &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
    );
    assert_eq!(
        layers(&w),
        vec![
            vec!["a".to_string()],
            vec!["b".to_string(), "c".to_string()],
            vec!["d".to_string()],
        ]
    );
}

#[test]
fn test_insertion_order_breaks_ties() {
    let w = workflow(&["z", "m", "a", "late"], &[("a", "late"), ("z", "late")]);
    let plan = plan(&w);
    assert_eq!(plan.layers()[0], vec!["z", "m", "a"]);
    assert_eq!(plan.layer_of("late"), Some(1));
}

#[test]
fn test_layers_partition_nodes_and_respect_dependencies() {
    let nodes = ["n0", "n1", "n2", "n3", "n4", "n5", "n6", "n7"];
    let edges = [
        ("n0", "n3"),
        ("n1", "n3"),
        ("n3", "n5"),
        ("n2", "n5"),
        ("n5", "n7"),
        ("n4", "n6"),
        ("n0", "n7"),
    ];
    let w = workflow(&nodes, &edges);
    let plan = plan(&w);

    let planned: Vec<&String> = plan.nodes().collect();
    let unique: HashSet<&String> = planned.iter().copied().collect();
    assert_eq!(planned.len(), nodes.len());
    assert_eq!(unique.len(), nodes.len());

    for (from, to) in edges {
        assert!(
            plan.layer_of(from).unwrap() < plan.layer_of(to).unwrap(),
            "{} must be planned before {}",
            from,
            to
        );
    }
    assert_eq!(plan.depth(), 4);
}

#[test]
fn test_parallel_edges_count_once() {
    let mut w = workflow(&["a", "b"], &[("a", "b")]);
    w.connect("a", "second", "b", "other");
    assert_eq!(plan(&w).depth(), 2);
}

#[test]
fn test_plan_is_idempotent() {
    let w = workflow(
        &["a", "b", "c", "d", "loner"],
        &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
    );
    let before = w.clone();

    let first = plan(&w);
    let second = plan(&w);

    assert_eq!(first, second);
    assert_eq!(first.layers()[0], vec!["a", "loner"]);
    assert_eq!(first.layers()[1], vec!["b", "c"]);
    assert_eq!(w, before);
}

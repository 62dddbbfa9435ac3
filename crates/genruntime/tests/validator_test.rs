use gencore::{
    DanglingReason, NodeCategory, NodeType, PortDefinition, PortType, ValidationError, Workflow,
    WorkflowNode,
};
use genruntime::{check_types, validate, DependencyGraph};
use std::collections::HashMap;

fn types() -> HashMap<String, NodeType> {
    let defs = [
        NodeType::new("source", NodeCategory::Text)
            .with_output(PortDefinition::output("out", PortType::Text))
            .with_output(PortDefinition::output("image", PortType::Image)),
        NodeType::new("sink", NodeCategory::Text)
            .with_input(PortDefinition::input("a", PortType::Text))
            .with_input(PortDefinition::input("b", PortType::Text).optional())
            .with_output(PortDefinition::output("out", PortType::Text)),
        NodeType::new("pick", NodeCategory::Transform)
            .with_input(
                PortDefinition::input("mode", PortType::Text).with_choices(["fast", "slow"]),
            )
            .with_input(PortDefinition::input("count", PortType::Integer).optional()),
        NodeType::new("flag", NodeCategory::Transform)
            .with_input(PortDefinition::input("on", PortType::Boolean))
            .with_input(PortDefinition::input("anything", PortType::Any).optional()),
    ];
    defs.into_iter().map(|d| (d.id.clone(), d)).collect()
}

fn source(id: &str) -> WorkflowNode {
    WorkflowNode::new(id, "source")
}

fn sink(id: &str) -> WorkflowNode {
    WorkflowNode::new(id, "sink")
}

#[test]
fn test_valid_chain_passes() {
    let mut w = Workflow::new("chain");
    w.add_node(source("s"));
    w.add_node(sink("t"));
    w.connect("s", "out", "t", "a");
    assert_eq!(validate(&w, &types()), Ok(()));
}

#[test]
fn test_duplicate_node_ids() {
    let mut w = Workflow::new("dup");
    w.add_node(source("s"));
    w.add_node(source("s"));
    assert_eq!(
        validate(&w, &types()),
        Err(ValidationError::DuplicateNodeId(vec!["s".to_string()]))
    );
}

#[test]
fn test_unknown_node_types_are_all_reported() {
    let mut w = Workflow::new("unknown");
    w.add_node(WorkflowNode::new("x", "nope"));
    w.add_node(source("s"));
    w.add_node(WorkflowNode::new("y", "also-nope"));

    match validate(&w, &types()) {
        Err(ValidationError::UnknownNodeType(unknown)) => {
            let ids: Vec<&str> = unknown.iter().map(|u| u.node_id.as_str()).collect();
            assert_eq!(ids, vec!["x", "y"]);
            assert_eq!(unknown[0].node_type, "nope");
        }
        other => panic!("expected UnknownNodeType, got {:?}", other),
    }
}

#[test]
fn test_dangling_edges() {
    let mut w = Workflow::new("dangling");
    w.add_node(source("s"));
    w.add_node(sink("t"));
    w.connect("s", "out", "t", "a");
    let ghost = w.connect("ghost", "out", "t", "b");
    let bad_port = w.connect("s", "missing", "t", "b");

    match validate(&w, &types()) {
        Err(ValidationError::DanglingEdge(dangling)) => {
            assert_eq!(dangling.len(), 2);
            assert_eq!(dangling[0].edge_id, ghost);
            assert_eq!(
                dangling[0].reason,
                DanglingReason::MissingSourceNode("ghost".to_string())
            );
            assert_eq!(dangling[1].edge_id, bad_port);
            assert!(matches!(
                &dangling[1].reason,
                DanglingReason::MissingOutputPort { port, .. } if port == "missing"
            ));
        }
        other => panic!("expected DanglingEdge, got {:?}", other),
    }
}

#[test]
fn test_fan_in_violation_names_all_edges() {
    let mut w = Workflow::new("fan-in");
    w.add_node(source("s1"));
    w.add_node(source("s2"));
    w.add_node(sink("t"));
    let e1 = w.connect("s1", "out", "t", "a");
    let e2 = w.connect("s2", "out", "t", "a");

    match validate(&w, &types()) {
        Err(ValidationError::FanInViolation(violations)) => {
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].node_id, "t");
            assert_eq!(violations[0].port, "a");
            assert_eq!(violations[0].edge_ids, vec![e1, e2]);
        }
        other => panic!("expected FanInViolation, got {:?}", other),
    }
}

#[test]
fn test_reported_cycle_is_a_real_cycle() {
    let mut w = Workflow::new("cycle");
    w.add_node(source("root"));
    for id in ["a", "b", "c"] {
        w.add_node(sink(id).with_value("a", "static"));
    }
    w.connect("root", "out", "a", "b");
    w.connect("a", "out", "b", "b");
    w.connect("b", "out", "c", "b");
    w.connect("c", "out", "a", "a");

    let cycle = match validate(&w, &types()) {
        Err(ValidationError::CycleDetected { cycle }) => cycle,
        other => panic!("expected CycleDetected, got {:?}", other),
    };
    assert_eq!(cycle.len(), 3);

    let graph = DependencyGraph::from_workflow(&w);
    for (i, id) in cycle.iter().enumerate() {
        let next = &cycle[(i + 1) % cycle.len()];
        let from = graph.index_of(id).unwrap();
        let to = graph.index_of(next).unwrap();
        assert!(
            graph.dependents(from).contains(&to),
            "{} -> {} is not an edge",
            id,
            next
        );
    }
}

#[test]
fn test_missing_required_inputs_all_reported() {
    let mut w = Workflow::new("missing");
    w.add_node(sink("t1"));
    w.add_node(sink("t2").with_value("b", "only optional"));
    w.add_node(sink("t3").with_value("a", "set"));

    match validate(&w, &types()) {
        Err(ValidationError::MissingRequiredInput(missing)) => {
            let ids: Vec<(&str, &str)> = missing
                .iter()
                .map(|m| (m.node_id.as_str(), m.port.as_str()))
                .collect();
            assert_eq!(ids, vec![("t1", "a"), ("t2", "a")]);
        }
        other => panic!("expected MissingRequiredInput, got {:?}", other),
    }
}

#[test]
fn test_null_static_value_counts_as_unset() {
    let mut w = Workflow::new("null");
    w.add_node(sink("t").with_value("a", gencore::Value::Null));
    assert!(matches!(
        validate(&w, &types()),
        Err(ValidationError::MissingRequiredInput(_))
    ));
}

#[test]
fn test_invalid_static_values() {
    let mut w = Workflow::new("static");
    w.add_node(
        WorkflowNode::new("p", "pick")
            .with_value("mode", "turbo")
            .with_value("count", "seven")
            .with_value("colour", "red"),
    );

    match validate(&w, &types()) {
        Err(ValidationError::InvalidStaticInput(invalid)) => {
            let ports: Vec<&str> = invalid.iter().map(|i| i.port.as_str()).collect();
            assert_eq!(ports, vec!["colour", "count", "mode"]);
        }
        other => panic!("expected InvalidStaticInput, got {:?}", other),
    }
}

#[test]
fn test_stale_static_value_on_connected_port_is_ignored() {
    let mut w = Workflow::new("stale");
    w.add_node(source("s"));
    w.add_node(sink("t").with_value("a", 42i64));
    w.connect("s", "out", "t", "a");
    assert_eq!(validate(&w, &types()), Ok(()));

    w.nodes[1] = sink("t").with_value("a", 42i64).with_value("colour", "red");
    match validate(&w, &types()) {
        Err(ValidationError::InvalidStaticInput(invalid)) => {
            let ports: Vec<&str> = invalid.iter().map(|i| i.port.as_str()).collect();
            assert_eq!(ports, vec!["colour"]);
        }
        other => panic!("expected InvalidStaticInput, got {:?}", other),
    }
}

#[test]
fn test_classes_checked_in_order() {
    // Unknown type and fan-in together: the unknown type wins.
    let mut w = Workflow::new("order");
    w.add_node(source("s1"));
    w.add_node(source("s2"));
    w.add_node(sink("t"));
    w.add_node(WorkflowNode::new("x", "nope"));
    w.connect("s1", "out", "t", "a");
    w.connect("s2", "out", "t", "a");

    assert!(matches!(
        validate(&w, &types()),
        Err(ValidationError::UnknownNodeType(_))
    ));
}

#[test]
fn test_validation_is_idempotent() {
    let mut w = Workflow::new("idempotent");
    w.add_node(sink("t1"));
    w.add_node(source("s"));
    w.connect("s", "out", "t1", "b");

    let registry = types();
    let first = validate(&w, &registry);
    let snapshot = w.clone();
    let second = validate(&w, &registry);
    assert_eq!(first, second);
    assert_eq!(w, snapshot);
}

/// Over every wiring of one source into one sink: validation passes exactly
/// when the required input is covered and no input has two edges.
#[test]
fn test_passes_iff_required_covered_and_no_fan_in() {
    let wirings: [&[&str]; 7] = [
        &[],
        &["a"],
        &["b"],
        &["a", "b"],
        &["a", "a"],
        &["b", "b"],
        &["a", "a", "b"],
    ];

    for edges in wirings {
        for static_a in [false, true] {
            let mut w = Workflow::new("grid");
            w.add_node(source("s1"));
            w.add_node(source("s2"));
            let mut target = sink("t");
            if static_a {
                target = target.with_value("a", "static");
            }
            w.add_node(target);
            for (i, port) in edges.iter().enumerate() {
                let from = if i % 2 == 0 { "s1" } else { "s2" };
                w.connect(from, "out", "t", *port);
            }

            let covered = static_a || edges.contains(&"a");
            let fan_in = ["a", "b"]
                .iter()
                .any(|p| edges.iter().filter(|e| *e == p).count() > 1);
            let expected = covered && !fan_in;

            assert_eq!(
                validate(&w, &types()).is_ok(),
                expected,
                "edges {:?}, static a: {}",
                edges,
                static_a
            );
        }
    }
}

#[test]
fn test_type_mismatch_reports_edge_and_types() {
    let mut w = Workflow::new("types");
    w.add_node(source("s"));
    w.add_node(WorkflowNode::new("f", "flag"));
    let edge = w.connect("s", "image", "f", "on");
    w.connect("s", "image", "f", "anything");

    assert_eq!(validate(&w, &types()), Ok(()));
    let mismatches = check_types(&w, &types()).unwrap_err();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].edge_id, edge);
    assert_eq!(mismatches[0].expected, PortType::Boolean);
    assert_eq!(mismatches[0].actual, PortType::Image);
}

//! Structural validation of workflows.
//!
//! Checks run in a fixed order and stop at the first failing class, but a
//! failing class reports every offending node or edge it finds.

use crate::graph::DependencyGraph;
use gencore::{
    DanglingEdge, DanglingReason, FanIn, InvalidStatic, MissingInput, TypeRegistry,
    UnknownNodeType, ValidationError, Workflow,
};
use std::collections::{HashMap, HashSet};

/// Validate a workflow against the node types in `registry`.
pub fn validate<R>(workflow: &Workflow, registry: &R) -> Result<(), ValidationError>
where
    R: TypeRegistry + ?Sized,
{
    check_unique_ids(workflow)?;
    check_node_types(workflow, registry)?;
    check_edge_references(workflow, registry)?;
    check_fan_in(workflow)?;
    check_acyclic(workflow)?;
    check_required_inputs(workflow, registry)?;
    check_static_inputs(workflow, registry)?;
    Ok(())
}

fn check_unique_ids(workflow: &Workflow) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for node in &workflow.nodes {
        if !seen.insert(node.id.as_str()) && !duplicates.contains(&node.id) {
            duplicates.push(node.id.clone());
        }
    }
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::DuplicateNodeId(duplicates))
    }
}

fn check_node_types<R>(workflow: &Workflow, registry: &R) -> Result<(), ValidationError>
where
    R: TypeRegistry + ?Sized,
{
    let unknown: Vec<UnknownNodeType> = workflow
        .nodes
        .iter()
        .filter(|n| registry.lookup(&n.node_type).is_none())
        .map(|n| UnknownNodeType {
            node_id: n.id.clone(),
            node_type: n.node_type.clone(),
        })
        .collect();

    if unknown.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::UnknownNodeType(unknown))
    }
}

fn check_edge_references<R>(workflow: &Workflow, registry: &R) -> Result<(), ValidationError>
where
    R: TypeRegistry + ?Sized,
{
    let mut dangling = Vec::new();

    for edge in &workflow.edges {
        let source = workflow.find_node(&edge.source);
        let target = workflow.find_node(&edge.target);

        let mut reasons = Vec::new();
        match source {
            None => reasons.push(DanglingReason::MissingSourceNode(edge.source.clone())),
            Some(node) => {
                let has_output = registry
                    .lookup(&node.node_type)
                    .is_some_and(|t| t.output(&edge.source_handle).is_some());
                if !has_output {
                    reasons.push(DanglingReason::MissingOutputPort {
                        node_id: node.id.clone(),
                        port: edge.source_handle.clone(),
                    });
                }
            }
        }
        match target {
            None => reasons.push(DanglingReason::MissingTargetNode(edge.target.clone())),
            Some(node) => {
                let has_input = registry
                    .lookup(&node.node_type)
                    .is_some_and(|t| t.input(&edge.target_handle).is_some());
                if !has_input {
                    reasons.push(DanglingReason::MissingInputPort {
                        node_id: node.id.clone(),
                        port: edge.target_handle.clone(),
                    });
                }
            }
        }

        dangling.extend(reasons.into_iter().map(|reason| DanglingEdge {
            edge_id: edge.id.clone(),
            reason,
        }));
    }

    if dangling.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::DanglingEdge(dangling))
    }
}

fn check_fan_in(workflow: &Workflow) -> Result<(), ValidationError> {
    let mut feeds: HashMap<(&str, &str), Vec<String>> = HashMap::new();
    let mut order: Vec<(&str, &str)> = Vec::new();

    for edge in &workflow.edges {
        let key = (edge.target.as_str(), edge.target_handle.as_str());
        let ids = feeds.entry(key).or_default();
        if ids.is_empty() {
            order.push(key);
        }
        ids.push(edge.id.clone());
    }

    let violations: Vec<FanIn> = order
        .into_iter()
        .filter_map(|key| {
            let ids = feeds.remove(&key)?;
            (ids.len() > 1).then(|| FanIn {
                node_id: key.0.to_string(),
                port: key.1.to_string(),
                edge_ids: ids,
            })
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::FanInViolation(violations))
    }
}

fn check_acyclic(workflow: &Workflow) -> Result<(), ValidationError> {
    match DependencyGraph::from_workflow(workflow).find_cycle() {
        Some(cycle) => Err(ValidationError::CycleDetected { cycle }),
        None => Ok(()),
    }
}

fn check_required_inputs<R>(workflow: &Workflow, registry: &R) -> Result<(), ValidationError>
where
    R: TypeRegistry + ?Sized,
{
    let connected: HashSet<(&str, &str)> = workflow
        .edges
        .iter()
        .map(|e| (e.target.as_str(), e.target_handle.as_str()))
        .collect();

    let mut missing = Vec::new();
    for node in &workflow.nodes {
        let Some(node_type) = registry.lookup(&node.node_type) else {
            continue;
        };
        for port in node_type.inputs.iter().filter(|p| p.required) {
            let fed = connected.contains(&(node.id.as_str(), port.name.as_str()));
            if !fed && node.static_value(&port.name).is_none() {
                missing.push(MissingInput {
                    node_id: node.id.clone(),
                    port: port.name.clone(),
                });
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingRequiredInput(missing))
    }
}

fn check_static_inputs<R>(workflow: &Workflow, registry: &R) -> Result<(), ValidationError>
where
    R: TypeRegistry + ?Sized,
{
    let mut invalid = Vec::new();
    for node in &workflow.nodes {
        let Some(node_type) = registry.lookup(&node.node_type) else {
            continue;
        };
        let connected: HashSet<&str> = workflow
            .incoming(&node.id)
            .map(|e| e.target_handle.as_str())
            .collect();
        let mut ports: Vec<&String> = node.data.keys().collect();
        ports.sort();
        for port_name in ports {
            let value = &node.data[port_name];
            // A connected port never reads its static value.
            let reason = match node_type.input(port_name) {
                None => Some(format!("is not an input of '{}'", node_type.id)),
                Some(_) if value.is_null() || connected.contains(port_name.as_str()) => None,
                Some(port) => port.check_value(value).err(),
            };
            if let Some(reason) = reason {
                invalid.push(InvalidStatic {
                    node_id: node.id.clone(),
                    port: port_name.clone(),
                    reason,
                });
            }
        }
    }

    if invalid.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::InvalidStaticInput(invalid))
    }
}

use gencore::{TypeMismatch, TypeRegistry, Workflow};

/// Check that every edge joins compatible port types.
///
/// Expects a structurally valid workflow; edges whose ports cannot be
/// resolved are skipped. All mismatches are collected, in edge order.
pub fn check_types<R>(workflow: &Workflow, registry: &R) -> Result<(), Vec<TypeMismatch>>
where
    R: TypeRegistry + ?Sized,
{
    let port_type = |node_id: &str, port: &str, output: bool| {
        let node = workflow.find_node(node_id)?;
        let node_type = registry.lookup(&node.node_type)?;
        let def = if output {
            node_type.output(port)
        } else {
            node_type.input(port)
        };
        def.map(|d| d.port_type)
    };

    let mismatches: Vec<TypeMismatch> = workflow
        .edges
        .iter()
        .filter_map(|edge| {
            let actual = port_type(&edge.source, &edge.source_handle, true)?;
            let expected = port_type(&edge.target, &edge.target_handle, false)?;
            (!actual.is_compatible_with(expected)).then(|| TypeMismatch {
                edge_id: edge.id.clone(),
                expected,
                actual,
            })
        })
        .collect();

    if mismatches.is_empty() {
        Ok(())
    } else {
        tracing::debug!("Type check found {} mismatched edges", mismatches.len());
        Err(mismatches)
    }
}

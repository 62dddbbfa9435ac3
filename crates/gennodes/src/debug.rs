use async_trait::async_trait;
use gencore::{
    NodeCategory, NodeContext, NodeError, NodeHandler, NodeOutput, NodeType, PortDefinition,
    PortType, Value,
};

/// Simple debug node that logs its inputs
pub struct DebugNode;

#[async_trait]
impl NodeHandler for DebugNode {
    fn definition(&self) -> NodeType {
        NodeType::new("debug.log", NodeCategory::Other)
            .with_name("Debug Log")
            .with_description("Logs input values for debugging")
            .with_input(PortDefinition::input("message", PortType::Any).optional())
            .with_output(PortDefinition::output("message", PortType::Text))
    }

    async fn invoke(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let message = match ctx.inputs.get("message") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_json().to_string(),
            None => "(no message)".to_string(),
        };

        ctx.events.info(format!("DEBUG: {}", message));

        let mut ports: Vec<&String> = ctx.inputs.keys().collect();
        ports.sort();
        for port in ports {
            ctx.events.info(format!("  {}: {}", port, ctx.inputs[port].to_json()));
        }

        Ok(NodeOutput::new().with_output("message", message))
    }
}

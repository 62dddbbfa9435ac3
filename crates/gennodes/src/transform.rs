use async_trait::async_trait;
use gencore::{
    NodeCategory, NodeContext, NodeError, NodeHandler, NodeOutput, NodeType, PortDefinition,
    PortType, Value,
};

/// Parse JSON string to Value
pub struct JsonParseNode;

#[async_trait]
impl NodeHandler for JsonParseNode {
    fn definition(&self) -> NodeType {
        NodeType::new("transform.json_parse", NodeCategory::Transform)
            .with_name("JSON Parse")
            .with_description("Parse JSON string")
            .with_input(PortDefinition::input("json", PortType::Text))
            .with_output(PortDefinition::output("parsed", PortType::Json))
    }

    async fn invoke(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let input = ctx.require_str("json")?;

        let parsed: serde_json::Value = serde_json::from_str(input)
            .map_err(|e| NodeError::ExecutionFailed(format!("JSON parse error: {}", e)))?;

        Ok(NodeOutput::new().with_output("parsed", Value::from(parsed)))
    }
}

/// Stringify Value to JSON
pub struct JsonStringifyNode;

#[async_trait]
impl NodeHandler for JsonStringifyNode {
    fn definition(&self) -> NodeType {
        NodeType::new("transform.json_stringify", NodeCategory::Transform)
            .with_name("JSON Stringify")
            .with_description("Convert value to JSON string")
            .with_input(PortDefinition::input("value", PortType::Any))
            .with_input(
                PortDefinition::input("pretty", PortType::Boolean)
                    .optional()
                    .with_default(true),
            )
            .with_output(PortDefinition::output("json", PortType::Text))
    }

    async fn invoke(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let value = ctx.require_input("value")?;
        let pretty = ctx
            .input_or("pretty", Value::Bool(true))
            .as_bool()
            .unwrap_or(true);

        let json_str = if pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
        .map_err(|e| NodeError::ExecutionFailed(format!("JSON stringify error: {}", e)))?;

        Ok(NodeOutput::new().with_output("json", json_str))
    }
}

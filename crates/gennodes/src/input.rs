use async_trait::async_trait;
use gencore::{
    NodeCategory, NodeContext, NodeError, NodeHandler, NodeOutput, NodeType, PortDefinition,
    PortType,
};

/// Source node emitting a text value set on the canvas.
pub struct TextInputNode;

#[async_trait]
impl NodeHandler for TextInputNode {
    fn definition(&self) -> NodeType {
        NodeType::new("input.text", NodeCategory::Other)
            .with_name("Text Input")
            .with_description("Provides a static text value")
            .with_input(PortDefinition::input("value", PortType::Text))
            .with_output(PortDefinition::output("text", PortType::Text))
    }

    async fn invoke(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let value = ctx.require_str("value")?;
        Ok(NodeOutput::new().with_output("text", value))
    }
}

/// Source node emitting a number.
pub struct NumberInputNode;

#[async_trait]
impl NodeHandler for NumberInputNode {
    fn definition(&self) -> NodeType {
        NodeType::new("input.number", NodeCategory::Other)
            .with_name("Number Input")
            .with_description("Provides a static numeric value")
            .with_input(PortDefinition::input("value", PortType::Float))
            .with_output(PortDefinition::output("number", PortType::Float))
    }

    async fn invoke(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let value = ctx.require_input("value")?;
        let number = value.as_f64().ok_or_else(|| NodeError::InvalidInputType {
            field: "value".to_string(),
            expected: "number".to_string(),
            actual: value.kind_name().to_string(),
        })?;
        Ok(NodeOutput::new().with_output("number", number))
    }
}

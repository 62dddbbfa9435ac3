use async_trait::async_trait;
use gencore::{
    NodeCategory, NodeContext, NodeError, NodeHandler, NodeOutput, NodeType, PortDefinition,
    PortType, Value,
};
use tokio::time::{sleep, Duration};

/// Delay execution for a specified duration
pub struct DelayNode;

#[async_trait]
impl NodeHandler for DelayNode {
    fn definition(&self) -> NodeType {
        NodeType::new("time.delay", NodeCategory::Other)
            .with_name("Delay")
            .with_description("Delay execution for specified milliseconds, passing the value through")
            .with_input(PortDefinition::input("value", PortType::Any).optional())
            .with_input(
                PortDefinition::input("delay_ms", PortType::Integer)
                    .optional()
                    .with_default(1000i64),
            )
            .with_output(PortDefinition::output("value", PortType::Any))
    }

    async fn invoke(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let delay_ms = ctx
            .input_or("delay_ms", Value::Integer(1000))
            .as_i64()
            .ok_or_else(|| NodeError::Configuration("delay_ms must be an integer".to_string()))?;
        if delay_ms < 0 {
            return Err(NodeError::Configuration(format!(
                "delay_ms must not be negative, got {}",
                delay_ms
            )));
        }

        ctx.events.info(format!("Delaying for {}ms", delay_ms));

        tokio::select! {
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
            _ = sleep(Duration::from_millis(delay_ms as u64)) => {}
        }

        Ok(NodeOutput::new().with_output("value", ctx.input_or("value", Value::Null)))
    }
}

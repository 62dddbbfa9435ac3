use async_trait::async_trait;
use gencore::{
    NodeCategory, NodeContext, NodeError, NodeHandler, NodeOutput, NodeType, PortDefinition,
    PortType, Value,
};
use std::collections::HashMap;

/// HTTP request node: the generic way to call a provider API.
pub struct HttpRequestNode {
    client: reqwest::Client,
}

impl HttpRequestNode {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for HttpRequestNode {
    fn definition(&self) -> NodeType {
        NodeType::new("http.request", NodeCategory::Other)
            .with_name("HTTP Request")
            .with_description("Make HTTP requests")
            .with_input(PortDefinition::input("url", PortType::Text))
            .with_input(
                PortDefinition::input("method", PortType::Text)
                    .optional()
                    .with_default("GET")
                    .with_choices(["GET", "POST", "PUT", "DELETE"]),
            )
            .with_input(PortDefinition::input("body", PortType::Any).optional())
            .with_input(PortDefinition::input("headers", PortType::Json).optional())
            .with_output(PortDefinition::output("status", PortType::Integer))
            .with_output(PortDefinition::output("body", PortType::Text))
            .with_output(PortDefinition::output("headers", PortType::Json))
    }

    async fn invoke(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let url = ctx.require_str("url")?;
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| NodeError::Configuration(format!("Invalid url '{}': {}", url, e)))?;
        let method_value = ctx.input_or("method", Value::from("GET"));
        let method = method_value.as_str().unwrap_or("GET");

        ctx.events.info(format!("{} {}", method, url));

        let mut request = match method.to_uppercase().as_str() {
            "GET" => self.client.get(parsed.clone()),
            "POST" => self.client.post(parsed.clone()),
            "PUT" => self.client.put(parsed.clone()),
            "DELETE" => self.client.delete(parsed.clone()),
            _ => return Err(NodeError::Configuration(format!("Unsupported method: {}", method))),
        };

        match ctx.inputs.get("body") {
            Some(Value::String(text)) => request = request.body(text.clone()),
            Some(Value::Null) | None => {}
            Some(other) => request = request.json(&other.to_json()),
        }

        if let Some(Value::Object(headers)) = ctx.inputs.get("headers") {
            for (key, value) in headers {
                if let Some(val_str) = value.as_str() {
                    request = request.header(key, val_str);
                }
            }
        }

        let response = tokio::select! {
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
            sent = request.send() => sent
                .map_err(|e| NodeError::ExecutionFailed(format!("HTTP request failed: {}", e)))?,
        };

        let status = response.status().as_u16();
        let headers_map: HashMap<String, Value> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(v.to_str().unwrap_or(""))))
            .collect();

        let body_text = response
            .text()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Failed to read response: {}", e)))?;

        ctx.events.info(format!("Response status: {}", status));

        if status >= 400 {
            return Err(NodeError::ExecutionFailed(format!(
                "{} {} returned {}: {}",
                method, url, status, body_text
            )));
        }

        Ok(NodeOutput::new()
            .with_output("status", status as i64)
            .with_output("body", body_text)
            .with_output("headers", Value::Object(headers_map))
            .with_provider("http", parsed.host_str().unwrap_or("unknown")))
    }
}

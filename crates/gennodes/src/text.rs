use async_trait::async_trait;
use gencore::{
    NodeCategory, NodeContext, NodeError, NodeHandler, NodeOutput, NodeType, PortDefinition,
    PortType, Value,
};
use std::collections::HashMap;

/// Fills `{{name}}` placeholders of a prompt template.
///
/// Values come from the `vars` object, plus `{{text}}` from the `text`
/// input. Placeholders without a value are left as written.
pub struct TemplateNode;

#[async_trait]
impl NodeHandler for TemplateNode {
    fn definition(&self) -> NodeType {
        NodeType::new("text.template", NodeCategory::Transform)
            .with_name("Prompt Template")
            .with_description("Substitute {{name}} placeholders in a template")
            .with_input(PortDefinition::input("template", PortType::Text))
            .with_input(PortDefinition::input("text", PortType::Text).optional())
            .with_input(PortDefinition::input("vars", PortType::Json).optional())
            .with_output(PortDefinition::output("text", PortType::Text))
    }

    async fn invoke(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let template = ctx.require_str("template")?;

        let mut vars: HashMap<String, String> = match ctx.inputs.get("vars") {
            None => HashMap::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), display(v)))
                .collect(),
            Some(other) => {
                return Err(NodeError::InvalidInputType {
                    field: "vars".to_string(),
                    expected: "object".to_string(),
                    actual: other.kind_name().to_string(),
                })
            }
        };
        if let Some(text) = ctx.inputs.get("text").and_then(Value::as_str) {
            vars.insert("text".to_string(), text.to_string());
        }

        let (rendered, unresolved) = render(template, &vars);
        if !unresolved.is_empty() {
            ctx.events
                .warn(format!("Unresolved placeholders: {}", unresolved.join(", ")));
        }

        Ok(NodeOutput::new().with_output("text", rendered))
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Media(m) => m.uri.clone(),
        other => other.to_json().to_string(),
    }
}

/// Render a template, returning the text and the names that had no value.
fn render(template: &str, vars: &HashMap<String, String>) -> (String, Vec<String>) {
    let mut out = String::with_capacity(template.len());
    let mut unresolved = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return (out, unresolved);
        };
        let name = after[..end].trim();
        match vars.get(name) {
            Some(value) => out.push_str(value),
            None => {
                out.push_str(&rest[start..start + 2 + end + 2]);
                if !unresolved.iter().any(|n| n == name) {
                    unresolved.push(name.to_string());
                }
            }
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    (out, unresolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_known_names() {
        let (text, unresolved) = render("a {{ subject }} in {{style}}", &vars(&[("subject", "cat"), ("style", "oil")]));
        assert_eq!(text, "a cat in oil");
        assert!(unresolved.is_empty());
    }

    #[test]
    fn keeps_unknown_and_unterminated_placeholders() {
        let (text, unresolved) = render("{{x}} and {{y", &vars(&[]));
        assert_eq!(text, "{{x}} and {{y");
        assert_eq!(unresolved, vec!["x".to_string()]);
    }
}

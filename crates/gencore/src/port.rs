use crate::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic type of a port. Closed set; `Any` is the only wildcard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    #[serde(alias = "string")]
    Text,
    #[serde(alias = "int")]
    Integer,
    Float,
    Boolean,
    Image,
    Video,
    Audio,
    /// Structured data.
    #[serde(alias = "structured")]
    Json,
    Any,
}

impl PortType {
    /// Edge compatibility: identical types, or either side is `Any`.
    pub fn is_compatible_with(self, other: PortType) -> bool {
        match (self, other) {
            (PortType::Any, _) | (_, PortType::Any) => true,
            (a, b) => a == b,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PortType::Text => "text",
            PortType::Integer => "integer",
            PortType::Float => "float",
            PortType::Boolean => "boolean",
            PortType::Image => "image",
            PortType::Video => "video",
            PortType::Audio => "audio",
            PortType::Json => "json",
            PortType::Any => "any",
        }
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed slot on a node type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub port_type: PortType,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default, alias = "options", skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
}

fn default_required() -> bool {
    true
}

impl PortDefinition {
    /// A required input port.
    pub fn input(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            port_type,
            description: String::new(),
            default: None,
            required: true,
            choices: None,
        }
    }

    /// An output port. `required` carries no meaning on outputs.
    pub fn output(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            required: false,
            ..Self::input(name, port_type)
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// Check a value against this port's type and choice set.
    pub fn check_value(&self, value: &Value) -> Result<(), String> {
        if !value.conforms_to(self.port_type) {
            return Err(format!(
                "expects {}, got {}",
                self.port_type,
                value.kind_name()
            ));
        }
        if let (Some(choices), Some(s)) = (&self.choices, value.as_str()) {
            if !choices.iter().any(|c| c == s) {
                return Err(format!(
                    "value '{}' is not one of [{}]",
                    s,
                    choices.join(", ")
                ));
            }
        }
        Ok(())
    }
}

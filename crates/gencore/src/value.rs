use crate::PortType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Dynamic value carried by node inputs and outputs.
///
/// Serialized untagged, so plain JSON maps onto it directly. An object with
/// exactly `kind` and `uri` (and optionally `mimeType`) is read as a media
/// reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Media(MediaRef),
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
}

/// Reference to generated or uploaded media.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaRef {
    pub fn new(kind: MediaKind, uri: impl Into<String>) -> Self {
        Self {
            kind,
            uri: uri.into(),
            mime_type: None,
        }
    }

    pub fn image(uri: impl Into<String>) -> Self {
        Self::new(MediaKind::Image, uri)
    }

    pub fn video(uri: impl Into<String>) -> Self {
        Self::new(MediaKind::Video, uri)
    }

    pub fn audio(uri: impl Into<String>) -> Self {
        Self::new(MediaKind::Audio, uri)
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_media(&self) -> Option<&MediaRef> {
        match self {
            Value::Media(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the value's shape, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Media(m) => match m.kind {
                MediaKind::Image => "image",
                MediaKind::Video => "video",
                MediaKind::Audio => "audio",
            },
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Whether this value may flow into a port of the given type.
    ///
    /// Media ports also accept plain strings (URIs or data URLs). Float ports
    /// accept integers.
    pub fn conforms_to(&self, port_type: PortType) -> bool {
        match (port_type, self) {
            (PortType::Any | PortType::Json, _) => true,
            (_, Value::Null) => false,
            (PortType::Text, Value::String(_)) => true,
            (PortType::Integer, Value::Integer(_)) => true,
            (PortType::Float, Value::Float(_) | Value::Integer(_)) => true,
            (PortType::Boolean, Value::Bool(_)) => true,
            (PortType::Image | PortType::Video | PortType::Audio, Value::String(_)) => true,
            (PortType::Image, Value::Media(m)) => m.kind == MediaKind::Image,
            (PortType::Video, Value::Media(m)) => m.kind == MediaKind::Video,
            (PortType::Audio, Value::Media(m)) => m.kind == MediaKind::Audio,
            _ => false,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<MediaRef> for Value {
    fn from(m: MediaRef) -> Self {
        Value::Media(m)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                // Route through serde so media references are recognized.
                let json = serde_json::Value::Object(obj);
                match serde_json::from_value::<MediaRef>(json.clone()) {
                    Ok(media) => Value::Media(media),
                    Err(_) => match json {
                        serde_json::Value::Object(obj) => Value::Object(
                            obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
                        ),
                        _ => Value::Null,
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_deserializes_into_values() {
        let v: Value = serde_json::from_str(r#"{"a": 1, "b": 1.5, "c": "x", "d": null}"#).unwrap();
        let Value::Object(map) = v else {
            panic!("expected object");
        };
        assert_eq!(map["a"], Value::Integer(1));
        assert_eq!(map["b"], Value::Float(1.5));
        assert_eq!(map["c"], Value::String("x".into()));
        assert!(map["d"].is_null());
    }

    #[test]
    fn media_objects_are_recognized() {
        let v: Value = serde_json::from_str(r#"{"kind": "video", "uri": "s3://clip.mp4"}"#).unwrap();
        assert_eq!(v, Value::Media(MediaRef::video("s3://clip.mp4")));

        let from_json = Value::from(serde_json::json!({"kind": "image", "uri": "a.png"}));
        assert_eq!(from_json, Value::Media(MediaRef::image("a.png")));
    }

    #[test]
    fn conformance_follows_port_types() {
        assert!(Value::from(3i64).conforms_to(PortType::Float));
        assert!(!Value::from(3.0).conforms_to(PortType::Integer));
        assert!(Value::from("https://x/y.png").conforms_to(PortType::Image));
        assert!(!Value::Media(MediaRef::audio("a.wav")).conforms_to(PortType::Video));
        assert!(Value::Null.conforms_to(PortType::Any));
        assert!(!Value::Null.conforms_to(PortType::Text));
        assert!(!Value::from(true).conforms_to(PortType::Text));
    }
}

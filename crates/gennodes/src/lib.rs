//! Standard node library
//!
//! Collection of built-in nodes for common operations

mod debug;
mod http;
mod input;
mod text;
mod time;
mod transform;

pub use debug::DebugNode;
pub use http::HttpRequestNode;
pub use input::{NumberInputNode, TextInputNode};
pub use text::TemplateNode;
pub use time::DelayNode;
pub use transform::{JsonParseNode, JsonStringifyNode};
use genruntime::NodeRegistry;

use std::sync::Arc;

/// Register all standard nodes with a registry
pub fn register_all(registry: &mut NodeRegistry) {
    registry.register(Arc::new(TextInputNode));
    registry.register(Arc::new(NumberInputNode));
    registry.register(Arc::new(TemplateNode));
    registry.register(Arc::new(JsonParseNode));
    registry.register(Arc::new(JsonStringifyNode));
    registry.register(Arc::new(DebugNode));
    registry.register(Arc::new(DelayNode));
    registry.register(Arc::new(HttpRequestNode::new()));
}

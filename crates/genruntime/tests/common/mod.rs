#![allow(dead_code)]

use async_trait::async_trait;
use gencore::{
    MediaMetadata, MediaRef, NodeCategory, NodeContext, NodeError, NodeHandler, NodeOutput, NodeType,
    PortDefinition, PortType, Value, Workflow, WorkflowNode,
};
use genruntime::{Engine, EngineConfig, MemoryRecordSink, NodeRegistry};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Tracks how many delay handlers run at once.
#[derive(Default)]
pub struct Probe {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Probe {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// `text-generate`: prompt in, text out, reports a mock provider.
pub struct TextGenerate;

#[async_trait]
impl NodeHandler for TextGenerate {
    fn definition(&self) -> NodeType {
        NodeType::new("text-generate", NodeCategory::Text)
            .with_input(PortDefinition::input("prompt", PortType::Text))
            .with_output(PortDefinition::output("text", PortType::Text))
    }

    async fn invoke(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let prompt = ctx.require_str("prompt")?;
        Ok(NodeOutput::new()
            .with_output("text", format!("generated: {}", prompt))
            .with_provider("mock", "mock-text-1")
            .with_cost(0.01))
    }
}

/// `image-generate`: prompt in, image reference out.
pub struct ImageGenerate;

#[async_trait]
impl NodeHandler for ImageGenerate {
    fn definition(&self) -> NodeType {
        NodeType::new("image-generate", NodeCategory::Image)
            .with_input(PortDefinition::input("prompt", PortType::Text))
            .with_output(PortDefinition::output("image", PortType::Image))
    }

    async fn invoke(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        ctx.require_str("prompt")?;
        Ok(NodeOutput::new()
            .with_output("image", MediaRef::image(format!("mock://{}.png", ctx.node_id)))
            .with_provider("mock", "mock-image-1"))
    }
}

/// `video-generate`: prompt in, video reference out, with media analysis.
pub struct VideoGenerate;

impl VideoGenerate {
    pub fn media() -> MediaMetadata {
        MediaMetadata {
            motion_score: Some(0.72),
            frame_count: Some(120),
            fps: Some(24.0),
            duration_ms: Some(5000),
            aspect_ratio: Some("16:9".to_string()),
            ..MediaMetadata::default()
        }
    }
}

#[async_trait]
impl NodeHandler for VideoGenerate {
    fn definition(&self) -> NodeType {
        NodeType::new("video-generate", NodeCategory::Video)
            .with_input(PortDefinition::input("prompt", PortType::Text))
            .with_output(PortDefinition::output("video", PortType::Video))
    }

    async fn invoke(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        ctx.require_str("prompt")?;
        Ok(NodeOutput::new()
            .with_output("video", MediaRef::video(format!("mock://{}.mp4", ctx.node_id)))
            .with_provider("mock", "mock-video-1")
            .with_cost(0.25)
            .with_media(Self::media()))
    }
}

/// `flag-check`: consumes a boolean. Never wired to a compatible source in
/// the tests.
pub struct FlagCheck;

#[async_trait]
impl NodeHandler for FlagCheck {
    fn definition(&self) -> NodeType {
        NodeType::new("flag-check", NodeCategory::Transform)
            .with_input(PortDefinition::input("flag", PortType::Boolean))
            .with_output(PortDefinition::output("label", PortType::Text))
    }

    async fn invoke(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let flag = ctx.require_input("flag")?.as_bool().unwrap_or(false);
        Ok(NodeOutput::new().with_output("label", flag.to_string()))
    }
}

/// `fail`: always errors.
pub struct Fail;

#[async_trait]
impl NodeHandler for Fail {
    fn definition(&self) -> NodeType {
        NodeType::new("fail", NodeCategory::Transform)
            .with_input(PortDefinition::input("value", PortType::Any).optional())
            .with_output(PortDefinition::output("value", PortType::Any))
    }

    async fn invoke(&self, _ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        Err(NodeError::ExecutionFailed("provider unavailable".to_string()))
    }
}

/// `delay`: sleeps `ms`, passes `value` through. Returns `Cancelled` when
/// its token fires.
pub struct Delay {
    pub probe: Arc<Probe>,
}

#[async_trait]
impl NodeHandler for Delay {
    fn definition(&self) -> NodeType {
        NodeType::new("delay", NodeCategory::Transform)
            .with_input(PortDefinition::input("value", PortType::Any).optional())
            .with_input(PortDefinition::input("ms", PortType::Integer).optional().with_default(10i64))
            .with_output(PortDefinition::output("value", PortType::Any))
    }

    async fn invoke(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let ms = ctx.require_input("ms")?.as_i64().unwrap_or(10).max(0) as u64;
        let value = ctx.input_or("value", Value::from(ctx.node_id.as_str()));

        self.probe.enter();
        let outcome = tokio::select! {
            _ = ctx.cancellation.cancelled() => Err(NodeError::Cancelled),
            _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(()),
        };
        self.probe.exit();

        outcome.map(|_| NodeOutput::new().with_output("value", value))
    }
}

/// `merge`: joins two text-ish inputs.
pub struct Merge;

#[async_trait]
impl NodeHandler for Merge {
    fn definition(&self) -> NodeType {
        NodeType::new("merge", NodeCategory::Transform)
            .with_input(PortDefinition::input("left", PortType::Any))
            .with_input(PortDefinition::input("right", PortType::Any))
            .with_output(PortDefinition::output("value", PortType::Text))
    }

    async fn invoke(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let left = ctx.require_input("left")?.as_str().unwrap_or("?").to_string();
        let right = ctx.require_input("right")?.as_str().unwrap_or("?").to_string();
        Ok(NodeOutput::new().with_output("value", format!("{}+{}", left, right)))
    }
}

/// `flaky`: fails until it has been called `fail_times` times.
pub struct Flaky {
    pub fail_times: u32,
    pub calls: Arc<AtomicU32>,
}

#[async_trait]
impl NodeHandler for Flaky {
    fn definition(&self) -> NodeType {
        NodeType::new("flaky", NodeCategory::Text)
            .with_output(PortDefinition::output("text", PortType::Text))
    }

    async fn invoke(&self, _ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.fail_times {
            return Err(NodeError::ExecutionFailed(format!("transient failure {}", call)));
        }
        Ok(NodeOutput::new().with_output("text", "finally"))
    }
}

/// Handler returning a fixed output under an arbitrary type id.
pub struct Fixed {
    pub definition: NodeType,
    pub outputs: HashMap<String, Value>,
}

#[async_trait]
impl NodeHandler for Fixed {
    fn definition(&self) -> NodeType {
        self.definition.clone()
    }

    async fn invoke(&self, _ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        Ok(NodeOutput {
            outputs: self.outputs.clone(),
            ..NodeOutput::default()
        })
    }
}

pub struct Panics;

#[async_trait]
impl NodeHandler for Panics {
    fn definition(&self) -> NodeType {
        NodeType::new("panic", NodeCategory::Other)
            .with_output(PortDefinition::output("value", PortType::Any))
    }

    async fn invoke(&self, _ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        panic!("handler blew up");
    }
}

pub struct Harness {
    pub engine: Engine,
    pub sink: Arc<MemoryRecordSink>,
    pub probe: Arc<Probe>,
    pub flaky_calls: Arc<AtomicU32>,
}

pub fn registry(probe: &Arc<Probe>, flaky_calls: &Arc<AtomicU32>) -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.register(Arc::new(TextGenerate));
    registry.register(Arc::new(ImageGenerate));
    registry.register(Arc::new(VideoGenerate));
    registry.register(Arc::new(FlagCheck));
    registry.register(Arc::new(Fail));
    registry.register(Arc::new(Delay {
        probe: Arc::clone(probe),
    }));
    registry.register(Arc::new(Merge));
    registry.register(Arc::new(Flaky {
        fail_times: 2,
        calls: Arc::clone(flaky_calls),
    }));
    registry.register(Arc::new(Panics));
    registry.register(Arc::new(Fixed {
        definition: NodeType::new("silent", NodeCategory::Text)
            .with_output(PortDefinition::output("text", PortType::Text)),
        outputs: HashMap::new(),
    }));
    registry.register(Arc::new(Fixed {
        definition: NodeType::new("wrong-type", NodeCategory::Text)
            .with_output(PortDefinition::output("count", PortType::Integer)),
        outputs: HashMap::from([("count".to_string(), Value::from("three"))]),
    }));
    registry.register(Arc::new(Fixed {
        definition: NodeType::new("chatty", NodeCategory::Text)
            .with_output(PortDefinition::output("text", PortType::Text)),
        outputs: HashMap::from([
            ("text".to_string(), Value::from("kept")),
            ("debug".to_string(), Value::from("dropped")),
        ]),
    }));
    registry
}

pub fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

pub fn harness_with(config: EngineConfig) -> Harness {
    init_tracing();
    let probe = Arc::new(Probe::default());
    let flaky_calls = Arc::new(AtomicU32::new(0));
    let sink = Arc::new(MemoryRecordSink::new());
    let engine = Engine::with_config(Arc::new(registry(&probe, &flaky_calls)), config)
        .with_record_sink(sink.clone());
    Harness {
        engine,
        sink,
        probe,
        flaky_calls,
    }
}

pub fn text_node(id: &str, prompt: &str) -> WorkflowNode {
    WorkflowNode::new(id, "text-generate").with_value("prompt", prompt)
}

pub fn delay_node(id: &str, ms: i64) -> WorkflowNode {
    WorkflowNode::new(id, "delay").with_value("ms", ms)
}

/// Workflow of delay nodes chained `a -> b -> c ...` in the given order.
pub fn delay_chain(ids: &[&str], ms: i64) -> Workflow {
    let mut workflow = Workflow::new("chain");
    for id in ids {
        workflow.add_node(delay_node(id, ms));
    }
    for pair in ids.windows(2) {
        workflow.connect(pair[0], "value", pair[1], "value");
    }
    workflow
}

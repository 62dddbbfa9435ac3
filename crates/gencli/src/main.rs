mod jsonl;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use gencore::{
    ExecutionEvent, GenerationStats, NodeEvent, NodeStatus, RecordSink, RunStatus, StaticInputs,
    Workflow, WorkflowNode,
};
use genruntime::{Engine, EngineConfig, NodeRegistry, NullRecordSink};
use jsonl::JsonlRecordSink;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "genflow")]
#[command(about = "Generation workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Static input overrides as JSON: {"<node id>": {"<port>": value}}
        #[arg(short, long)]
        input: Option<String>,

        /// Engine configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maximum number of nodes running at once
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Directory for the JSONL generation log
        #[arg(long, env = "GENFLOW_RECORDS_DIR")]
        records_dir: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file and print its execution plan
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Run { verbose: true, .. });
    tracing_subscriber::fmt()
        .with_max_level(if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    match cli.command {
        Commands::Run {
            file,
            input,
            config,
            max_concurrent,
            records_dir,
            ..
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(max) = max_concurrent {
                config.max_concurrent_nodes = max;
            }
            run_workflow(file, input, config, records_dir).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

fn registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    gennodes::register_all(&mut registry);
    registry
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        None => Ok(EngineConfig::default()),
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
        }
    }
}

fn load_workflow(file: &Path) -> Result<Workflow> {
    let workflow_json = std::fs::read_to_string(file)
        .with_context(|| format!("reading workflow {}", file.display()))?;
    serde_json::from_str(&workflow_json).with_context(|| format!("parsing workflow {}", file.display()))
}

async fn run_workflow(
    file: PathBuf,
    input: Option<String>,
    config: EngineConfig,
    records_dir: Option<PathBuf>,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow = load_workflow(&file)?;

    println!("📋 Workflow: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Edges: {}", workflow.edges.len());
    println!();

    let static_inputs: StaticInputs = match input {
        Some(input_str) => serde_json::from_str(&input_str)
            .context("input must be a JSON object of node id -> port -> value")?,
        None => StaticInputs::new(),
    };

    let sink: Arc<dyn RecordSink> = match &records_dir {
        Some(dir) => {
            println!("🗂️  Writing generation records under {}", dir.display());
            Arc::new(JsonlRecordSink::new(dir))
        }
        None => Arc::new(NullRecordSink),
    };

    let engine = Engine::with_config(Arc::new(registry()), config).with_record_sink(sink);

    // Subscribe to events for real-time output
    let mut events = engine.subscribe_events();

    let event_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if print_event(event) {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("Event listener lagged, missed {} events", missed);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let run_id = engine.start_run(&workflow, &static_inputs).await?;

    let report = tokio::select! {
        report = engine.wait_for_run(run_id) => report?,
        _ = tokio::signal::ctrl_c() => {
            println!("🛑 Interrupted, cancelling run {}", run_id);
            engine.cancel_run(run_id).await?;
            engine.wait_for_run(run_id).await?
        }
    };

    // Closes the bus so the listener drains and stops even if it lagged
    // past the final event.
    drop(engine);
    if let Err(e) = event_task.await {
        tracing::warn!("Event listener failed: {}", e);
    }

    println!();
    println!("📊 Execution Summary:");
    println!("   Run ID: {}", report.run_id());
    println!("   Status: {}", report.status());
    println!(
        "   Completed: {}/{} nodes",
        report.summary.count(NodeStatus::Completed),
        report.summary.nodes.len()
    );

    let outputs: Vec<_> = report
        .summary
        .nodes
        .iter()
        .filter(|n| !n.outputs.is_empty())
        .collect();
    if !outputs.is_empty() {
        println!();
        println!("📤 Outputs:");
        for node in outputs {
            println!("   Node {}:", node.node_id);
            let mut ports: Vec<_> = node.outputs.iter().collect();
            ports.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in ports {
                println!("     {}: {}", key, value.to_json());
            }
        }
    }

    let stats = GenerationStats::from_records(&report.records);
    println!();
    println!(
        "🧾 Records: {} ({}ms total latency, ${:.4} cost)",
        stats.total, stats.total_latency_ms, stats.total_cost_usd
    );
    for failure in &report.record_failures {
        println!(
            "   ⚠️  Record {} for node {} not stored: {}",
            failure.record_id, failure.node_id, failure.error
        );
    }

    match report.status() {
        RunStatus::Completed => Ok(()),
        status => Err(anyhow!("run {} finished with status {}", run_id, status)),
    }
}

/// Print one event. Returns true once the run has finished.
fn print_event(event: ExecutionEvent) -> bool {
    match event {
        ExecutionEvent::RunStarted { node_count, .. } => {
            println!("▶️  Run started ({} nodes)", node_count);
        }
        ExecutionEvent::NodeProgress(update) => match update.status {
            NodeStatus::Pending => {}
            NodeStatus::Running => println!("  ⚡ Starting node: {}", update.node_id),
            NodeStatus::Completed => println!(
                "  ✅ Node {} completed in {}ms",
                update.node_id,
                update.data.latency_ms.unwrap_or(0)
            ),
            NodeStatus::Error => println!(
                "  ❌ Node {} failed: {}",
                update.node_id,
                update.data.error.unwrap_or_default()
            ),
            NodeStatus::Cancelled => println!("  ⏭️  Node {} cancelled", update.node_id),
        },
        ExecutionEvent::NodeEvent { node_id, event, .. } => match event {
            NodeEvent::Info { message } => {
                println!("     ℹ️  [{}] {}", node_id, message);
            }
            NodeEvent::Warning { message } => {
                println!("     ⚠️  [{}] {}", node_id, message);
            }
            NodeEvent::Progress { percent, message } => {
                if let Some(msg) = message {
                    println!("     📊 [{}] {}% - {}", node_id, percent, msg);
                } else {
                    println!("     📊 [{}] {}%", node_id, percent);
                }
            }
        },
        ExecutionEvent::RunFinished {
            status,
            duration_ms,
            ..
        } => {
            match status {
                RunStatus::Completed => {
                    println!("✨ Run completed successfully in {}ms", duration_ms)
                }
                RunStatus::Cancelled => println!("🛑 Run cancelled after {}ms", duration_ms),
                _ => println!("💥 Run failed after {}ms", duration_ms),
            }
            return true;
        }
    }
    false
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(&file)?;
    let engine = Engine::new(Arc::new(registry()));
    let plan = engine.validate(&workflow)?;

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Edges: {}", workflow.edges.len());
    println!();
    println!("🧭 Execution plan ({} layers):", plan.depth());
    for (i, layer) in plan.layers().iter().enumerate() {
        println!("   {}: {}", i, layer.join(", "));
    }

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = registry();
    for definition in registry.definitions() {
        println!("  • {} ({})", definition.id, definition.category);
        if !definition.description.is_empty() {
            println!("    {}", definition.description);
        }
        for port in &definition.inputs {
            let marker = if port.required { "" } else { "?" };
            println!("    ← {}{}: {}", port.name, marker, port.port_type);
        }
        for port in &definition.outputs {
            println!("    → {}: {}", port.name, port.port_type);
        }
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let mut workflow = Workflow::new("Example Prompt Workflow");

    let subject = workflow.add_node(
        WorkflowNode::new("subject", "input.text")
            .with_value("value", "a lighthouse in a storm")
            .with_position(100.0, 100.0),
    );
    let prompt = workflow.add_node(
        WorkflowNode::new("prompt", "text.template")
            .with_value("template", "Cinematic photo of {{text}}, dramatic lighting")
            .with_position(300.0, 100.0),
    );
    let log = workflow.add_node(WorkflowNode::new("log", "debug.log").with_position(500.0, 100.0));

    workflow.connect(subject.clone(), "text", prompt.clone(), "text");
    workflow.connect(prompt, "text", log, "message");

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  genflow run --file {} --input '{{\"{}\": {{\"value\": \"a fox in the snow\"}}}}'",
        output.display(),
        subject
    );

    Ok(())
}

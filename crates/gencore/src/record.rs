//! Generation records: the durable trace of every node invocation.

use crate::{
    MediaMetadata, NodeCategory, NodeId, NodeStatus, RecordError, RunId, Value, WorkflowId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One node invocation that reached a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub id: String,
    pub run_id: RunId,
    pub workflow_id: WorkflowId,
    pub node_id: NodeId,
    pub node_type: String,
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    #[serde(rename = "type")]
    pub category: NodeCategory,
    pub status: NodeStatus,
    /// Handler attempts, including opt-in retries.
    pub attempts: u32,
    pub input: HashMap<String, Value>,
    pub output: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metrics: RecordMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_meta: Option<MediaMetadata>,
}

impl GenerationRecord {
    /// Fresh record id in the `gen_<12 hex>` form.
    pub fn new_id() -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("gen_{}", &hex[..12])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetrics {
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

/// Append-only destination for generation records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn append(&self, record: GenerationRecord) -> Result<(), RecordError>;
}

/// Aggregate counts over a set of records.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStats {
    pub total: usize,
    pub by_type: HashMap<NodeCategory, usize>,
    pub by_provider: HashMap<String, usize>,
    pub by_status: HashMap<NodeStatus, usize>,
    pub total_latency_ms: u64,
    pub total_cost_usd: f64,
}

impl GenerationStats {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a GenerationRecord>,
    {
        let mut stats = GenerationStats::default();
        for record in records {
            stats.total += 1;
            *stats.by_type.entry(record.category).or_default() += 1;
            *stats.by_provider.entry(record.provider.clone()).or_default() += 1;
            *stats.by_status.entry(record.status).or_default() += 1;
            stats.total_latency_ms += record.metrics.latency_ms;
            stats.total_cost_usd += record.metrics.cost_usd.unwrap_or(0.0);
        }
        stats
    }
}

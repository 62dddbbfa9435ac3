use async_trait::async_trait;
use gencore::{GenerationRecord, NodeId, RecordError, RecordSink, RunId};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Per-run recorder enforcing one record per invoked node.
///
/// Records go to a writer task over a channel, so recording never waits on
/// the sink. [`GenerationRecorder::finish`] flushes the writer.
pub struct GenerationRecorder {
    run_id: RunId,
    recorded: HashSet<NodeId>,
    records: Vec<GenerationRecord>,
    tx: mpsc::UnboundedSender<GenerationRecord>,
    writer: JoinHandle<Vec<RecordFailure>>,
}

/// A record the sink refused to store.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordFailure {
    pub record_id: String,
    pub node_id: NodeId,
    pub error: String,
}

/// What the recorder produced once flushed.
#[derive(Debug, Default)]
pub struct RecorderOutcome {
    /// Every record handed to the sink, in recording order.
    pub records: Vec<GenerationRecord>,
    /// Records among `records` that never reached durable storage.
    pub failures: Vec<RecordFailure>,
}

impl GenerationRecorder {
    pub fn spawn(run_id: RunId, sink: Arc<dyn RecordSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<GenerationRecord>();
        let writer = tokio::spawn(async move {
            let mut failures = Vec::new();
            while let Some(record) = rx.recv().await {
                let record_id = record.id.clone();
                let node_id = record.node_id.clone();
                if let Err(e) = sink.append(record).await {
                    tracing::error!("Failed to store generation record {}: {}", record_id, e);
                    failures.push(RecordFailure {
                        record_id,
                        node_id,
                        error: e.to_string(),
                    });
                }
            }
            failures
        });

        Self {
            run_id,
            recorded: HashSet::new(),
            records: Vec::new(),
            tx,
            writer,
        }
    }

    pub fn record(&mut self, record: GenerationRecord) -> Result<(), RecordError> {
        if !self.recorded.insert(record.node_id.clone()) {
            return Err(RecordError::Duplicate {
                run_id: self.run_id,
                node_id: record.node_id,
            });
        }
        self.records.push(record.clone());
        self.tx.send(record).map_err(|_| RecordError::SinkClosed)
    }

    /// Wait until every record handed over has been offered to the sink.
    pub async fn finish(self) -> RecorderOutcome {
        let Self { tx, writer, records, .. } = self;
        drop(tx);
        let failures = match writer.await {
            Ok(failures) => failures,
            Err(e) => {
                tracing::error!("Record writer task failed: {}", e);
                records
                    .iter()
                    .map(|r| RecordFailure {
                        record_id: r.id.clone(),
                        node_id: r.node_id.clone(),
                        error: format!("record writer failed: {}", e),
                    })
                    .collect()
            }
        };
        RecorderOutcome { records, failures }
    }
}

/// In-process sink keeping every record, in append order.
#[derive(Default)]
pub struct MemoryRecordSink {
    records: Mutex<Vec<GenerationRecord>>,
}

impl MemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<GenerationRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordSink for MemoryRecordSink {
    async fn append(&self, record: GenerationRecord) -> Result<(), RecordError> {
        self.records
            .lock()
            .map_err(|e| RecordError::Write(e.to_string()))?
            .push(record);
        Ok(())
    }
}

/// Sink that drops every record.
pub struct NullRecordSink;

#[async_trait]
impl RecordSink for NullRecordSink {
    async fn append(&self, _record: GenerationRecord) -> Result<(), RecordError> {
        Ok(())
    }
}

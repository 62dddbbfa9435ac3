use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gencore::{GenerationRecord, RecordError, RecordSink};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only JSONL log of generation records, one file per UTC day:
/// `<root>/YYYY/MM/DD/generations.jsonl`.
pub struct JsonlRecordSink {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlRecordSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, timestamp: DateTime<Utc>) -> PathBuf {
        self.root
            .join(timestamp.format("%Y/%m/%d").to_string())
            .join("generations.jsonl")
    }
}

#[async_trait]
impl RecordSink for JsonlRecordSink {
    async fn append(&self, record: GenerationRecord) -> Result<(), RecordError> {
        let path = self.path_for(record.timestamp);
        let mut line =
            serde_json::to_string(&record).map_err(|e| RecordError::Write(e.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| RecordError::Write(format!("{}: {}", dir.display(), e)))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| RecordError::Write(format!("{}: {}", path.display(), e)))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| RecordError::Write(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| RecordError::Write(e.to_string()))?;

        tracing::debug!("Appended record {} to {}", record.id, path.display());
        Ok(())
    }
}

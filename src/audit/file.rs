//! JSON-line file sink: one audit record per line, timestamp ISO-8601
//! with timezone.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::AuditSink;
use crate::error::AuditError;
use crate::types::AuditRecord;

pub struct FileSink {
    path: PathBuf,
    file: Mutex<Option<tokio::fs::File>>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), file: Mutex::new(None) }
    }

    async fn open(&self) -> Result<(), AuditError> {
        let mut guard = self.file.lock().await;
        if guard.is_none() {
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            *guard = Some(file);
        }
        Ok(())
    }
}

#[async_trait]
impl AuditSink for FileSink {
    async fn log(&self, record: &AuditRecord) -> Result<(), AuditError> {
        self.open().await?;
        let line = serde_json::to_string(record)?;
        let mut guard = self.file.lock().await;
        let file = guard.as_mut().expect("opened above");
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CorrelationId, DecisionSource, ValueMap};

    fn record() -> AuditRecord {
        AuditRecord {
            timestamp: chrono::Utc::now(),
            agent_id: "a1".to_string(),
            tool: "db".to_string(),
            function: "select".to_string(),
            arguments: ValueMap::new(),
            allow: true,
            reason: "ok".to_string(),
            duration_ms: 5,
            correlation_id: CorrelationId::new(),
            decision_source: DecisionSource::Policy,
        }
    }

    #[tokio::test]
    async fn appends_one_json_line_per_record() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("enact-audit-test-{}.jsonl", uuid::Uuid::new_v4()));
        let sink = FileSink::new(&path);

        sink.log(&record()).await.unwrap();
        sink.log(&record()).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["agent_id"], "a1");

        tokio::fs::remove_file(&path).await.ok();
    }
}

//! JSON-lines history of messages relayed into the game.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::bridge::ports::HistorySink;
use crate::common::clock::Clock;
use crate::common::error::GatewayResult;
use crate::common::types::OwnerId;

/// One line of the history file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: String,
    pub direction: String,
    pub owner_id: OwnerId,
    pub display_name: String,
    pub content: String,
}

/// Appends one JSON object per line; writes are serialized.
pub struct JsonlHistorySink {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl JsonlHistorySink {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistorySink for JsonlHistorySink {
    async fn append_outbound(
        &self,
        owner_id: OwnerId,
        display_name: &str,
        content: &str,
    ) -> GatewayResult<()> {
        let record = HistoryRecord {
            timestamp: self.clock.now().format("%Y-%m-%d %H:%M:%S").to_string(),
            direction: "platform_to_game".to_string(),
            owner_id,
            display_name: display_name.to_string(),
            content: content.to_string(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::clock::ManualClock;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_appends_one_record_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("history.jsonl");
        let clock = Arc::new(ManualClock::new(
            NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
        ));
        let sink = JsonlHistorySink::new(&path, clock);
        assert_eq!(sink.path(), path.as_path());

        tokio_test::assert_ok!(sink.append_outbound(1, "Carol", "hello").await);
        tokio_test::assert_ok!(sink.append_outbound(2, "Dave", "line\nbreak").await);

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let records: Vec<HistoryRecord> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp, "2024-06-01 08:30:00");
        assert_eq!(records[0].owner_id, 1);
        assert_eq!(records[0].direction, "platform_to_game");
        assert_eq!(records[1].content, "line\nbreak");
    }
}

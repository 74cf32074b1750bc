use super::reducer::ExchangeSnapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;

/// Where completed exchanges are persisted. Failed exchanges never reach it.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn persist(&self, entry: &ExchangeSnapshot) -> Result<()>;
}

/// Appends one JSON object per completed exchange.
pub struct JsonlHistory {
    path: PathBuf,
}

impl JsonlHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read_all(&self) -> Result<Vec<ExchangeSnapshot>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("corrupt history entry"))
            .collect()
    }
}

#[async_trait]
impl HistorySink for JsonlHistory {
    async fn persist(&self, entry: &ExchangeSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<ExchangeSnapshot>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ExchangeSnapshot> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HistorySink for MemoryHistory {
    async fn persist(&self, entry: &ExchangeSnapshot) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("history lock poisoned"))?
            .push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Mode, Record, Tag};

    fn snapshot(prompt: &str) -> ExchangeSnapshot {
        ExchangeSnapshot {
            mode: Mode::Translation,
            prompt: prompt.to_string(),
            records: vec![Record::new(Tag::MainTranslation, "Bonjour")],
            text: String::new(),
            detected_language: Some("en".to_string()),
        }
    }

    #[tokio::test]
    async fn test_jsonl_history_appends_entries() {
        let dir = tempfile::tempdir().unwrap();
        let history = JsonlHistory::new(dir.path().join("nested").join("history.jsonl"));
        assert!(history.read_all().await.unwrap().is_empty());

        history.persist(&snapshot("Hello")).await.unwrap();
        history.persist(&snapshot("Goodbye")).await.unwrap();

        let entries = history.read_all().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].prompt, "Hello");
        assert_eq!(entries[1], snapshot("Goodbye"));

        let raw = std::fs::read_to_string(history.path()).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(!raw.contains("\"text\""));
    }

    #[tokio::test]
    async fn test_memory_history_records_in_order() {
        let history = MemoryHistory::new();
        history.persist(&snapshot("a")).await.unwrap();
        history.persist(&snapshot("b")).await.unwrap();
        let prompts: Vec<_> = history.entries().into_iter().map(|e| e.prompt).collect();
        assert_eq!(prompts, vec!["a", "b"]);
    }
}

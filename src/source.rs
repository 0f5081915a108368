use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::types::ChatMessage;

/// Where a finite batch of chat messages comes from: a saved export file or
/// the live API. The aggregation core only ever sees the loaded batch.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Human description for log and error messages.
    fn describe(&self) -> String;

    /// Load the full message batch into memory.
    async fn load_messages(&self) -> Result<Vec<ChatMessage>>;
}

/// A chat export saved as a JSON array of messages.
pub struct ExportFile {
    path: PathBuf,
}

impl ExportFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MessageSource for ExportFile {
    fn describe(&self) -> String {
        format!("chat export {}", self.path.display())
    }

    async fn load_messages(&self) -> Result<Vec<ChatMessage>> {
        let mut bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let messages: Vec<ChatMessage> = simd_json::from_slice(&mut bytes)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(messages)
    }
}

/// Save a message batch as a pretty-printed JSON export.
pub fn write_export(path: &Path, messages: &[ChatMessage]) -> Result<()> {
    let json = simd_json::to_string_pretty(messages).context("Failed to serialize chat export")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn export_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chat.json");

        let messages = vec![ChatMessage {
            id: 7,
            attachments: Vec::new(),
            source_guid: None,
            created_at: 1700000000,
            user_id: "1001".to_string(),
            group_id: None,
            avatar_url: None,
            name: "Alice".to_string(),
            text: Some("hello".to_string()),
            favorited_by: Vec::new(),
            reactions: None,
        }];

        write_export(&path, &messages).expect("write export");
        let loaded = ExportFile::new(&path)
            .load_messages()
            .await
            .expect("load export");
        assert_eq!(loaded, messages);
    }

    #[tokio::test]
    async fn missing_export_is_an_error() {
        let source = ExportFile::new("/nonexistent/chat.json");
        assert!(source.load_messages().await.is_err());
    }
}

use crate::traits::{ChatMessage, Checkpointer};
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Stores each thread as `<dir>/<thread>.json` so conversations survive a
/// restart.
pub struct FileCheckpointer {
    dir: PathBuf,
}

impl FileCheckpointer {
    pub fn new(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create thread directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn thread_path(&self, thread_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_thread_id(thread_id)))
    }
}

/// Maps any id onto a safe file stem. Ids that needed rewriting get a hash
/// suffix so distinct ids do not collide.
fn sanitize_thread_id(thread_id: &str) -> String {
    let cleaned: String = thread_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned == thread_id && !cleaned.is_empty() {
        cleaned
    } else {
        format!("{}_{:x}", cleaned, md5::compute(thread_id.as_bytes()))
    }
}

#[async_trait]
impl Checkpointer for FileCheckpointer {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, thread_id: &str) -> anyhow::Result<Vec<ChatMessage>> {
        let path = self.thread_path(thread_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Corrupt thread checkpoint {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    async fn save(&self, thread_id: &str, messages: &[ChatMessage]) -> anyhow::Result<()> {
        let path = self.thread_path(thread_id);
        let content = serde_json::to_string_pretty(messages)?;
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    async fn clear(&self, thread_id: &str) -> anyhow::Result<bool> {
        match tokio::fs::remove_file(self.thread_path(thread_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn threads(&self) -> anyhow::Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

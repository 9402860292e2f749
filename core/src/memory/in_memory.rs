use crate::traits::{ChatMessage, Checkpointer};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Keeps every thread in process memory; everything is lost on restart.
#[derive(Default)]
pub struct InMemoryCheckpointer {
    threads: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, thread_id: &str) -> anyhow::Result<Vec<ChatMessage>> {
        Ok(self
            .threads
            .read()
            .await
            .get(thread_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, thread_id: &str, messages: &[ChatMessage]) -> anyhow::Result<()> {
        self.threads
            .write()
            .await
            .insert(thread_id.to_string(), messages.to_vec());
        Ok(())
    }

    async fn clear(&self, thread_id: &str) -> anyhow::Result<bool> {
        Ok(self.threads.write().await.remove(thread_id).is_some())
    }

    async fn threads(&self) -> anyhow::Result<Vec<String>> {
        let mut ids: Vec<String> = self.threads.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn threads_are_isolated() {
        let checkpointer = InMemoryCheckpointer::new();
        checkpointer
            .save("a", &[ChatMessage::user("I have chest pain")])
            .await
            .unwrap();
        checkpointer
            .save("b", &[ChatMessage::user("cancel 4")])
            .await
            .unwrap();

        assert_eq!(checkpointer.load("a").await.unwrap()[0].content, "I have chest pain");
        assert!(checkpointer.load("missing").await.unwrap().is_empty());
        assert_eq!(checkpointer.threads().await.unwrap(), vec!["a", "b"]);

        assert!(checkpointer.clear("a").await.unwrap());
        assert!(!checkpointer.clear("a").await.unwrap());
        assert!(checkpointer.load("a").await.unwrap().is_empty());
    }
}

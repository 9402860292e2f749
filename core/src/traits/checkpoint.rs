use crate::traits::ChatMessage;
use async_trait::async_trait;

/// Conversation state persisted per thread id, so a later turn on the same
/// thread resumes where the previous one stopped.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    fn name(&self) -> &str;

    /// Messages recorded for the thread, oldest first. Unknown threads are empty.
    async fn load(&self, thread_id: &str) -> anyhow::Result<Vec<ChatMessage>>;

    async fn save(&self, thread_id: &str, messages: &[ChatMessage]) -> anyhow::Result<()>;

    /// Returns whether the thread existed.
    async fn clear(&self, thread_id: &str) -> anyhow::Result<bool>;

    async fn threads(&self) -> anyhow::Result<Vec<String>>;
}

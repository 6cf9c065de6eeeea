use crate::traits::ChatMessage;

/// Conversation history handed to the model on every turn.
pub trait ChatMemory: Send + Sync {
    fn id(&self) -> &str;

    fn add(&self, message: ChatMessage) -> anyhow::Result<()>;

    fn messages(&self) -> Vec<ChatMessage>;

    fn clear(&self) -> anyhow::Result<()>;
}

/// Backing storage for chat memories, keyed by memory id.
pub trait ChatMemoryStore: Send + Sync {
    fn name(&self) -> &str;

    fn get_messages(&self, memory_id: &str) -> anyhow::Result<Vec<ChatMessage>>;

    fn update_messages(&self, memory_id: &str, messages: &[ChatMessage]) -> anyhow::Result<()>;

    fn delete_messages(&self, memory_id: &str) -> anyhow::Result<()>;
}

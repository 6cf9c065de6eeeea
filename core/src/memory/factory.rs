use crate::config::Config;
use crate::memory::{FileChatMemoryStore, InMemoryChatMemoryStore, MessageWindowChatMemory};
use crate::traits::{ChatMemory, ChatMemoryStore};
use anyhow::Result;
use std::sync::Arc;

/// Builds the chat memory selected by `config`, or `None` when memory is off.
pub fn create_memory(config: &Config, memory_id: &str) -> Result<Option<Arc<dyn ChatMemory>>> {
    if !config.memory.enabled {
        return Ok(None);
    }

    let store: Arc<dyn ChatMemoryStore> = if config.memory.persist {
        Arc::new(FileChatMemoryStore::new(config.workspace_dir.join("memory")))
    } else {
        Arc::new(InMemoryChatMemoryStore::new())
    };
    tracing::debug!(store = store.name(), memory_id, "Chat memory created");

    let memory = MessageWindowChatMemory::builder()
        .id(memory_id)
        .max_messages(config.memory.max_messages)
        .store(store)
        .build()?;

    Ok(Some(Arc::new(memory)))
}

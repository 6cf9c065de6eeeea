use crate::memory::InMemoryChatMemoryStore;
use crate::traits::{ChatMemory, ChatMemoryStore, ChatMessage};
use anyhow::Result;
use std::sync::{Arc, Mutex, PoisonError};

pub const DEFAULT_MEMORY_ID: &str = "default";

/// Keeps the most recent `max_messages` messages. The system message, when
/// present, sits at the front and is never evicted by the window.
pub struct MessageWindowChatMemory {
    id: String,
    max_messages: usize,
    store: Arc<dyn ChatMemoryStore>,
    lock: Mutex<()>,
}

impl MessageWindowChatMemory {
    pub fn with_capacity(max_messages: usize) -> Result<Self> {
        Self::builder().max_messages(max_messages).build()
    }

    pub fn builder() -> MessageWindowChatMemoryBuilder {
        MessageWindowChatMemoryBuilder::default()
    }

    fn ensure_capacity(&self, messages: &mut Vec<ChatMessage>) {
        while messages.len() > self.max_messages {
            let oldest = usize::from(messages.first().is_some_and(ChatMessage::is_system));
            if oldest >= messages.len() {
                break;
            }

            let evicted = messages.remove(oldest);
            tracing::trace!(memory_id = %self.id, role = evicted.role(), "Evicted message");

            if evicted.has_tool_calls() {
                while messages
                    .get(oldest)
                    .is_some_and(|m| matches!(m, ChatMessage::ToolResult { .. }))
                {
                    messages.remove(oldest);
                }
            }
        }
    }
}

impl ChatMemory for MessageWindowChatMemory {
    fn id(&self) -> &str {
        &self.id
    }

    fn add(&self, message: ChatMessage) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut messages = self.store.get_messages(&self.id)?;

        if message.is_system() {
            if messages.iter().any(|m| *m == message) {
                return Ok(());
            }
            messages.retain(|m| !m.is_system());
            messages.insert(0, message);
        } else {
            messages.push(message);
        }

        self.ensure_capacity(&mut messages);
        self.store.update_messages(&self.id, &messages)
    }

    fn messages(&self) -> Vec<ChatMessage> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match self.store.get_messages(&self.id) {
            Ok(mut messages) => {
                self.ensure_capacity(&mut messages);
                messages
            }
            Err(e) => {
                tracing::error!(memory_id = %self.id, error = %e, "Failed to read chat memory");
                Vec::new()
            }
        }
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.store.delete_messages(&self.id)
    }
}

#[derive(Default)]
pub struct MessageWindowChatMemoryBuilder {
    id: Option<String>,
    max_messages: Option<usize>,
    store: Option<Arc<dyn ChatMemoryStore>>,
}

impl MessageWindowChatMemoryBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = Some(max_messages);
        self
    }

    pub fn store(mut self, store: Arc<dyn ChatMemoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<MessageWindowChatMemory> {
        let max_messages = self
            .max_messages
            .ok_or_else(|| anyhow::anyhow!("max_messages must be set"))?;
        if max_messages == 0 {
            anyhow::bail!("max_messages must be at least 1");
        }

        Ok(MessageWindowChatMemory {
            id: self.id.unwrap_or_else(|| DEFAULT_MEMORY_ID.to_string()),
            max_messages,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryChatMemoryStore::new())),
            lock: Mutex::new(()),
        })
    }
}

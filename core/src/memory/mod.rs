pub mod factory;
pub mod store;
pub mod window;

pub use factory::create_memory;
pub use store::{FileChatMemoryStore, InMemoryChatMemoryStore};
pub use window::{DEFAULT_MEMORY_ID, MessageWindowChatMemory, MessageWindowChatMemoryBuilder};

pub mod memory;
pub mod provider;
pub mod tool;

pub use memory::{ChatMemory, ChatMemoryStore};
pub use provider::{
    ChatMessage, ChatRequest, ChatResponse, EventStream, Provider, ProviderEvent, ToolCall,
};
pub use tool::{Tool, ToolResult, ToolSpec};

pub mod ai_service;
pub mod registry;
pub mod token_stream;

pub use ai_service::{AiService, AiServiceBuilder, AiServices, DEFAULT_MAX_TOOL_ROUNDS};
pub use registry::ToolRegistry;
pub use token_stream::TokenStream;

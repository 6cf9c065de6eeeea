pub mod factory;
pub mod openai;

pub use factory::{create_provider, resolve_api_key};
pub use openai::OpenAIProvider;

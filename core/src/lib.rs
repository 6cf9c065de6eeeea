pub mod config;
pub mod memory;
pub mod providers;
pub mod service;
pub mod tools;
pub mod traits;

pub use config::*;
pub use memory::*;
pub use providers::*;
pub use service::*;
pub use tools::*;
pub use traits::*;

pub mod broker;
pub mod client;
pub mod types;

pub use broker::{ModelBroker, Notifier};
pub use client::{HttpLlmClient, LlmCallError, LlmClient};
pub use types::{ChatMessage, LlmTurn, Role, ToolSchema};

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn tool(name: &str, payload: &Value) -> Self {
        Self {
            role: Role::Tool,
            content: format!("[{name}] {payload}"),
        }
    }
}

/// A tool/function schema advertised to the model (spec.md §4.2, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The two shapes a model turn can take (spec.md §4.3): either a natural
/// language turn, or a request to invoke one of the four recognized
/// functions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LlmTurn {
    Text(String),
    FunctionCall { name: String, arguments: Value },
}

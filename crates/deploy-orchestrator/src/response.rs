use serde::Serialize;
use serde_json::Value;

/// What the Gateway relays to the client after one `process` turn (spec.md
/// §4.2, §6 `message {data:{...}}`). `text` becomes the chat frame's
/// content; the rest are fields a function call produced beyond plain text
/// and that the orchestrator must preserve on the way out.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrchestratorResponse {
    pub text: String,
    pub request_env_vars: bool,
    pub detected_env_vars: Vec<String>,
    pub actions: Vec<String>,
    pub data: Option<Value>,
    pub deployment_url: Option<String>,
    /// Set when health verification degraded but the deployment still
    /// sealed successful (spec.md §7) — the Gateway frames this as a
    /// `warning`, never as an `error`.
    pub warning: Option<String>,
}

impl OrchestratorResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

use deploy_core::{DeployError, Result};
use deploy_llm::ToolSchema;
use serde_json::Value;

/// The four function contracts advertised to the model (spec.md §4.2).
/// `handle_function_call` dispatches on these names by an exact match, so
/// this list and that match arm must stay in lockstep.
pub fn tool_schemas() -> Vec<ToolSchema> {
    vec![
        ToolSchema {
            name: "clone-and-analyze".to_string(),
            description: "Clone a Git repository and analyze its language, framework, and dependencies.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "repo_url": {"type": "string"},
                    "branch": {"type": "string"},
                },
                "required": ["repo_url"],
            }),
        },
        ToolSchema {
            name: "deploy".to_string(),
            description: "Build and deploy the previously analyzed project to the managed serverless platform.".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        },
        ToolSchema {
            name: "list-repositories".to_string(),
            description: "List repositories reachable with the configured Git credential.".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        },
        ToolSchema {
            name: "get-logs".to_string(),
            description: "Fetch recent logs for the currently deployed service.".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        },
    ]
}

/// The result of executing one of the four recognized functions, before
/// it's handed back to the model as a tool response (spec.md §4.2). Every
/// field beyond `tool_payload` mirrors one the orchestrator must preserve
/// in its reply to the Gateway.
#[derive(Debug, Clone, Default)]
pub struct FunctionOutcome {
    pub tool_payload: Value,
    pub request_env_vars: bool,
    pub detected_env_vars: Vec<String>,
    pub actions: Vec<String>,
    pub data: Option<Value>,
    pub deployment_url: Option<String>,
    pub warning: Option<String>,
}

impl FunctionOutcome {
    /// A function result that failed locally (validation, not-found, a
    /// collaborator error) — still fed back to the model as a tool
    /// response so it can phrase a user-facing explanation, per spec.md
    /// §7's `validation`/`not-found`/`*-failed` kinds.
    pub fn error(err: DeployError) -> Self {
        let kind = err.kind();
        Self {
            tool_payload: serde_json::json!({
                "status": "error",
                "message": err.to_string(),
                "remediation": err.remediation(),
            }),
            warning: if kind == deploy_core::ErrorKind::HealthDegraded {
                Some(err.to_string())
            } else {
                None
            },
            ..Default::default()
        }
    }
}

pub fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DeployError::Validation(format!("missing required argument `{key}`")))
}

pub fn optional_str<'a>(args: &'a Value, key: &'a str, default: &'a str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or(default)
}

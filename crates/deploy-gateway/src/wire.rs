//! The bidirectional framed wire protocol (spec.md §6, §4.1). Every frame is
//! a JSON object tagged by `type`, mirroring `AgentEvent`'s existing serde
//! shape (SPEC_FULL.md §6) so this is a generalization of a pattern already
//! in the teacher corpus rather than a new invention.

use chrono::{DateTime, Utc};
use deploy_core::{DeploymentId, StageEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    Init {
        session_id: String,
        instance_id: String,
        #[serde(default)]
        is_reconnect: bool,
    },
    Message {
        message: String,
        #[serde(default)]
        metadata: Option<serde_json::Value>,
    },
    EnvVarsUploaded {
        variables: Vec<UploadedEnvVar>,
        count: usize,
    },
    Pong,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadedEnvVar {
    pub key: String,
    pub value: String,
    #[serde(rename = "isSecret", default)]
    pub is_secret: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    Connected {
        session_id: String,
        message: String,
    },
    Ping {
        timestamp: DateTime<Utc>,
    },
    Typing {
        timestamp: DateTime<Utc>,
    },
    Message {
        data: MessageData,
        timestamp: DateTime<Utc>,
    },
    DeploymentStarted {
        deployment_id: DeploymentId,
        message: String,
        timestamp: DateTime<Utc>,
    },
    StageProgress {
        #[serde(flatten)]
        event: StageEvent,
        timestamp: DateTime<Utc>,
    },
    Warning {
        message: String,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
        code: &'static str,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MessageData {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl OutboundFrame {
    pub fn connected(session_id: &str) -> Self {
        OutboundFrame::Connected {
            session_id: session_id.to_string(),
            message: "session ready".to_string(),
        }
    }

    pub fn ping() -> Self {
        OutboundFrame::Ping { timestamp: Utc::now() }
    }

    pub fn typing() -> Self {
        OutboundFrame::Typing { timestamp: Utc::now() }
    }

    pub fn message(data: MessageData) -> Self {
        OutboundFrame::Message { data, timestamp: Utc::now() }
    }

    pub fn deployment_started(deployment_id: DeploymentId) -> Self {
        OutboundFrame::DeploymentStarted {
            deployment_id,
            message: "deployment started".to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn stage_progress(event: StageEvent) -> Self {
        OutboundFrame::StageProgress { event, timestamp: Utc::now() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        OutboundFrame::Warning { message: message.into(), timestamp: Utc::now() }
    }

    pub fn error(message: impl Into<String>, code: &'static str) -> Self {
        OutboundFrame::Error { message: message.into(), code, timestamp: Utc::now() }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","message":"frame encode failed","code":"API_ERROR"}"#.to_string()
        })
    }
}

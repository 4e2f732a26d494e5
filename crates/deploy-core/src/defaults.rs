//! Normative numeric defaults (spec.md §5, §9). Real deployments may
//! override these via `AppConfig`, but the values below are what the test
//! suite assumes.

use std::time::Duration;

pub const INIT_FRAME_TIMEOUT: Duration = Duration::from_secs(10);
pub const RECEIVE_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const SEND_RETRY_ATTEMPTS: u32 = 3;
pub const SEND_RETRY_SPACING: Duration = Duration::from_millis(500);

pub const LLM_RETRY_ATTEMPTS: u32 = 3;
pub const LLM_RETRY_BASE: Duration = Duration::from_secs(1);

pub const BUILD_DEPLOY_RETRY_ATTEMPTS: u32 = 3;
pub const BUILD_DEPLOY_RETRY_BASE: Duration = Duration::from_secs(1);
pub const BUILD_STAGE_TIMEOUT: Duration = Duration::from_secs(15 * 60);
pub const DEPLOY_STAGE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const HEALTH_STAGE_TIMEOUT: Duration = Duration::from_secs(2 * 60);

pub const HEALTH_PER_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);
pub const HEALTH_MAX_RETRIES: u32 = 5;
pub const HEALTH_BACKOFF_BASE: Duration = Duration::from_secs(2);

pub const ORCHESTRATOR_GRACE_PERIOD: Duration = Duration::from_secs(60 * 60);
pub const SWEEPER_INTERVAL: Duration = Duration::from_secs(60);

pub const LONG_RUNNING_OP_POLL_INTERVAL: Duration = Duration::from_secs(4);

pub const SERVICE_PORT: u16 = 8080;

pub const READY_COMMAND_WHITELIST: &[&str] = &[
    "deploy", "yes", "no", "skip", "proceed", "continue", "ok", "okay", "start", "go",
];

use deploy_core::{DeploymentId, StageEvent};
use std::sync::Arc;

/// Notifications the orchestrator pushes to the Gateway outside the
/// request/response of a single `process` call. A deploy runs far longer
/// than one turn, so its progress has to reach the client asynchronously
/// (spec.md §4.2 "progress channel", §4.5).
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    Typing,
    DeploymentStarted { deployment_id: DeploymentId },
    Progress(StageEvent),
    Warning(String),
}

/// The Gateway's send path, handed to an orchestrator once per session
/// before the first turn (spec.md §4.2). Kept generic over the wire
/// encoding — `deploy-gateway` owns translating `OrchestratorEvent` into
/// frames.
pub type EventSink = Arc<dyn Fn(OrchestratorEvent) + Send + Sync>;

use crate::ids::DeploymentId;
use serde::{Deserialize, Serialize};

/// Closed stage-tag set (spec.md §4.5). New stages are added here in
/// lockstep with the Pipeline Engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageTag {
    RepoClone,
    CodeAnalysis,
    DockerfileGen,
    RepoAccess,
    ContainerBuild,
    CloudDeployment,
    HealthVerification,
}

impl StageTag {
    /// Stage order for the pipeline (spec.md §4.4).
    pub const ORDER: [StageTag; 7] = [
        StageTag::RepoClone,
        StageTag::CodeAnalysis,
        StageTag::DockerfileGen,
        StageTag::RepoAccess,
        StageTag::ContainerBuild,
        StageTag::CloudDeployment,
        StageTag::HealthVerification,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageTag::RepoClone => "repo-clone",
            StageTag::CodeAnalysis => "code-analysis",
            StageTag::DockerfileGen => "dockerfile-gen",
            StageTag::RepoAccess => "repo-access",
            StageTag::ContainerBuild => "container-build",
            StageTag::CloudDeployment => "cloud-deployment",
            StageTag::HealthVerification => "health-verification",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Started,
    InProgress,
    Complete,
    Failed,
}

impl StageState {
    /// Whether `next` is a legal successor of `self` in the per-stage state
    /// machine: started → (in-progress)* → {complete | failed}, no
    /// regressions (spec.md §3, §8.4).
    pub fn can_transition_to(self, next: StageState) -> bool {
        use StageState::*;
        matches!(
            (self, next),
            (Started, InProgress) | (Started, Complete) | (Started, Failed) | (InProgress, InProgress) | (InProgress, Complete) | (InProgress, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StageState::Complete | StageState::Failed)
    }
}

/// A typed, ordered notification (spec.md §3, §4.5). Carries its own
/// `deployment_id` so a late-arriving event (e.g. from a straggling
/// subscriber loop) can always be attributed to the deployment it actually
/// came from, rather than whatever deployment happens to be "current" by
/// the time it's delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    pub deployment_id: DeploymentId,
    pub stage: StageTag,
    pub state: StageState,
    pub message: String,
    pub details: Option<serde_json::Value>,
    /// Monotonic sequence number within a deployment (spec.md §3).
    pub sequence: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_forbids_regressions() {
        assert!(StageState::Started.can_transition_to(StageState::InProgress));
        assert!(StageState::InProgress.can_transition_to(StageState::Complete));
        assert!(!StageState::Complete.can_transition_to(StageState::Failed));
        assert!(!StageState::Failed.can_transition_to(StageState::Complete));
        assert!(!StageState::Started.can_transition_to(StageState::Started));
    }

    #[test]
    fn stage_order_is_closed_and_ordered() {
        assert_eq!(StageTag::ORDER.len(), 7);
        assert_eq!(StageTag::ORDER[0], StageTag::RepoClone);
        assert_eq!(StageTag::ORDER[6], StageTag::HealthVerification);
    }
}

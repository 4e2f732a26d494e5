use deploy_cloud::CloudError;
use deploy_core::DeployError;

/// Which terminal taxonomy a stage's unrecoverable `CloudError::OperationFailed`
/// folds into (spec.md §7) — there's no cloud-specific error kind, so each
/// calling stage picks the bucket it belongs to.
#[derive(Debug, Clone, Copy)]
pub enum StageKind {
    Preflight,
    Build,
    Deploy,
}

/// Map a cloud-collaborator error onto the shared taxonomy (spec.md §7).
pub fn map_cloud_error(stage: StageKind, stage_label: &str, err: CloudError) -> DeployError {
    match err {
        CloudError::NotFound(msg) => DeployError::NotFound(format!("{stage_label}: {msg}")),
        CloudError::Auth(msg) => DeployError::Validation(format!("{stage_label}: {msg}")),
        CloudError::Http(msg) | CloudError::TimedOut(msg) => DeployError::Transport(format!("{stage_label}: {msg}")),
        CloudError::Io(err) => DeployError::Transport(format!("{stage_label}: {err}")),
        CloudError::OperationFailed(msg) => {
            let message = format!("{stage_label}: {msg}");
            match stage {
                StageKind::Preflight => DeployError::PreflightFailed { message, remediation: Vec::new() },
                StageKind::Build => DeployError::BuildFailed { message, remediation: Vec::new() },
                StageKind::Deploy => DeployError::DeployFailed { message, remediation: Vec::new() },
            }
        }
    }
}

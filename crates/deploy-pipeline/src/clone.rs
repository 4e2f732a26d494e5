use crate::errors::{map_cloud_error, StageKind};
use crate::PipelineClients;
use deploy_analyzer::analyze;
use deploy_core::{AnalysisResult, DeploymentId, DeploymentRecord, Result, StageOutcome, StageState, StageTag};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Stage 1 + 2 (spec.md §4.4): clone the repository into a working copy and
/// run the Analyzer over it. Called by the Orchestrator's clone-and-analyze
/// function; guarded by the anti-reclone invariant at the call site
/// (`ProjectContext::has_working_copy`), not here. Takes and seals its own
/// `DeploymentRecord`, the same way `deploy::deploy` does for stages 3-7
/// (spec.md §3: every pipeline invocation gets a record, created at start
/// and sealed at terminus).
pub async fn clone_and_analyze(
    clients: &PipelineClients,
    mut record: DeploymentRecord,
    working_copy_root: &Path,
    repo_url: &str,
    branch: &str,
) -> Result<(DeploymentRecord, PathBuf, AnalysisResult)> {
    let deployment_id = record.deployment_id;
    let outcome = match run_stages(clients, &mut record, deployment_id, working_copy_root, repo_url, branch).await {
        Ok((dest, analysis)) => {
            record.seal(true);
            Ok((record, dest, analysis))
        }
        Err(err) => {
            record.errors.push(err.to_string());
            record.seal(false);
            Err(err)
        }
    };
    clients.progress.retire(deployment_id);
    outcome
}

async fn run_stages(
    clients: &PipelineClients,
    record: &mut DeploymentRecord,
    deployment_id: DeploymentId,
    working_copy_root: &Path,
    repo_url: &str,
    branch: &str,
) -> Result<(PathBuf, AnalysisResult)> {
    let dest = working_copy_root.join(deployment_id.to_string());

    let started = Instant::now();
    clients
        .progress
        .publish(deployment_id, StageTag::RepoClone, StageState::Started, "cloning repository", None)
        .await?;

    let progress_cb: deploy_cloud::ProgressFn = Arc::new(|_downloaded, _total| {});
    let outcome = clients
        .git
        .clone_repo(repo_url, branch, &dest, progress_cb)
        .await
        .map_err(|err| map_cloud_error(StageKind::Preflight, "repo-clone", err));

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            record.record_stage(StageTag::RepoClone, StageOutcome::Failed, started.elapsed().as_millis() as u64);
            let _ = clients
                .progress
                .publish(deployment_id, StageTag::RepoClone, StageState::Failed, err.to_string(), None)
                .await;
            return Err(err);
        }
    };

    record.record_stage(StageTag::RepoClone, StageOutcome::Success, started.elapsed().as_millis() as u64);
    clients
        .progress
        .publish(
            deployment_id,
            StageTag::RepoClone,
            StageState::Complete,
            format!("cloned {} files in {:?}", outcome.file_count, started.elapsed()),
            Some(serde_json::json!({ "file_count": outcome.file_count, "total_bytes": outcome.total_bytes })),
        )
        .await?;

    let analysis_started = Instant::now();
    clients
        .progress
        .publish(deployment_id, StageTag::CodeAnalysis, StageState::Started, "analyzing project", None)
        .await?;

    let analysis = analyze(&dest, &clients.broker).await;

    record.record_stage(StageTag::CodeAnalysis, StageOutcome::Success, analysis_started.elapsed().as_millis() as u64);
    clients
        .progress
        .publish(
            deployment_id,
            StageTag::CodeAnalysis,
            StageState::Complete,
            format!("detected language {}", analysis.language),
            Some(serde_json::json!({ "framework": analysis.framework, "warnings": analysis.warnings })),
        )
        .await?;

    Ok((dest, analysis))
}

use crate::errors::{map_cloud_error, StageKind};
use crate::security::scan_recipe;
use crate::PipelineClients;
use deploy_cloud::{image_tag, ServiceSpec};
use deploy_core::defaults::{
    BUILD_DEPLOY_RETRY_ATTEMPTS, BUILD_DEPLOY_RETRY_BASE, BUILD_STAGE_TIMEOUT, DEPLOY_STAGE_TIMEOUT, HEALTH_STAGE_TIMEOUT, SERVICE_PORT,
};
use deploy_core::{
    AnalysisResult, DeployError, DeploymentId, DeploymentRecord, EnvVar, ResourceConfig, Result, StageOutcome, StageState, StageTag,
};
use deploy_health::HealthTiming;
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

/// Inputs to stages 3-7 that don't already live on `AnalysisResult` or the
/// deployment record (spec.md §4.4).
pub struct DeploySpec<'a> {
    pub service_name: String,
    pub project_id: String,
    pub region: String,
    pub registry: String,
    pub user_id: String,
    pub env_vars: &'a [EnvVar],
}

/// Everything the Orchestrator reports back to the client on success
/// (spec.md §4.4 outputs: "service URL, image tag, deployment record, cost
/// estimate, health-verification timing").
///
/// `health_timing` is `None` and `health_warning` is `Some` when health
/// verification didn't observe a healthy response in its window — per
/// spec.md §7 that's a non-terminal warning, not a pipeline failure, so the
/// deployment still seals successful.
pub struct DeployOutcome {
    pub record: DeploymentRecord,
    pub service_url: String,
    pub estimated_hourly_cost_usd: f64,
    pub health_timing: Option<HealthTiming>,
    pub health_warning: Option<String>,
}

struct HealthOutcome {
    timing: Option<HealthTiming>,
    warning: Option<String>,
}

/// Stages 3 through 7 (spec.md §4.4): dockerfile-gen, repo-access preflight,
/// container-build, cloud-deployment, health-verification. Assumes the
/// working copy and its `AnalysisResult` already exist.
pub async fn deploy(
    clients: &PipelineClients,
    mut record: DeploymentRecord,
    deployment_id: DeploymentId,
    working_copy: &Path,
    analysis: &AnalysisResult,
    spec: DeploySpec<'_>,
) -> Result<DeployOutcome> {
    let outcome = match run_stages(clients, &mut record, deployment_id, working_copy, analysis, &spec).await {
        Ok((service_url, resources, health)) => {
            record.seal(true);
            Ok(DeployOutcome {
                record,
                service_url,
                estimated_hourly_cost_usd: resources.estimated_hourly_cost_usd(),
                health_timing: health.timing,
                health_warning: health.warning,
            })
        }
        Err(err) => {
            record.errors.push(err.to_string());
            record.seal(false);
            Err(err)
        }
    };
    // Terminal stage's Complete/Failed event is already published and queued
    // on each subscriber's own channel by this point; retiring here just
    // stops the bus from holding this deployment's bookkeeping forever.
    clients.progress.retire(deployment_id);
    outcome
}

async fn run_stages(
    clients: &PipelineClients,
    record: &mut DeploymentRecord,
    deployment_id: DeploymentId,
    working_copy: &Path,
    analysis: &AnalysisResult,
    spec: &DeploySpec<'_>,
) -> Result<(String, ResourceConfig, HealthOutcome)> {
    let recipe = stage_dockerfile_gen(clients, record, deployment_id, working_copy, analysis).await?;
    stage_repo_access(clients, record, deployment_id, spec).await?;
    let built_tag = stage_container_build(clients, record, deployment_id, working_copy, &recipe.text, spec).await?;
    record.image_tag = Some(built_tag.clone());
    let (service_url, resources) = stage_cloud_deployment(clients, record, deployment_id, analysis, &built_tag, spec).await?;
    let health = stage_health_verification(clients, record, deployment_id, &service_url).await?;
    Ok((service_url, resources, health))
}

const DEFAULT_IGNORE: &str = ".git\nnode_modules\n__pycache__\n.venv\nvenv\n.env\n.env.*\n";

async fn stage_dockerfile_gen(
    clients: &PipelineClients,
    record: &mut DeploymentRecord,
    deployment_id: DeploymentId,
    working_copy: &Path,
    analysis: &AnalysisResult,
) -> Result<deploy_core::BuildRecipe> {
    let started = Instant::now();
    clients
        .progress
        .publish(deployment_id, StageTag::DockerfileGen, StageState::Started, "synthesizing build recipe", None)
        .await?;

    let recipe = deploy_recipe::synthesize(analysis, &clients.broker).await;

    std::fs::write(working_copy.join("Dockerfile"), &recipe.text).map_err(|err| DeployError::BuildFailed {
        message: format!("writing Dockerfile: {err}"),
        remediation: Vec::new(),
    })?;
    std::fs::write(working_copy.join(".dockerignore"), DEFAULT_IGNORE).map_err(|err| DeployError::BuildFailed {
        message: format!("writing .dockerignore: {err}"),
        remediation: Vec::new(),
    })?;

    record.record_stage(StageTag::DockerfileGen, StageOutcome::Success, started.elapsed().as_millis() as u64);
    clients
        .progress
        .publish(
            deployment_id,
            StageTag::DockerfileGen,
            StageState::Complete,
            "recipe written",
            Some(serde_json::json!({ "optimization_tags": recipe.optimization_tags })),
        )
        .await?;

    Ok(recipe)
}

async fn stage_repo_access(
    clients: &PipelineClients,
    record: &mut DeploymentRecord,
    deployment_id: DeploymentId,
    spec: &DeploySpec<'_>,
) -> Result<()> {
    let started = Instant::now();
    clients
        .progress
        .publish(deployment_id, StageTag::RepoAccess, StageState::Started, "verifying cloud access", None)
        .await?;

    if let Err(err) = clients.build.verify_project_access(&spec.project_id, &spec.region).await {
        record.record_stage(StageTag::RepoAccess, StageOutcome::Failed, started.elapsed().as_millis() as u64);
        let mapped = map_cloud_error(StageKind::Preflight, "repo-access", err);
        let _ = clients
            .progress
            .publish(deployment_id, StageTag::RepoAccess, StageState::Failed, mapped.to_string(), None)
            .await;
        return Err(mapped);
    }

    clients
        .progress
        .publish(deployment_id, StageTag::RepoAccess, StageState::InProgress, "creating container image registry", None)
        .await?;

    let registry = match clients.build.ensure_image_registry(&spec.project_id, &spec.region, &spec.registry).await {
        Ok(registry) => registry,
        Err(err) => {
            record.record_stage(StageTag::RepoAccess, StageOutcome::Failed, started.elapsed().as_millis() as u64);
            let mapped = map_cloud_error(StageKind::Preflight, "repo-access", err);
            let _ = clients
                .progress
                .publish(deployment_id, StageTag::RepoAccess, StageState::Failed, mapped.to_string(), None)
                .await;
            return Err(mapped);
        }
    };

    clients
        .progress
        .publish(deployment_id, StageTag::RepoAccess, StageState::InProgress, "creating source staging bucket", None)
        .await?;

    let bucket = match clients.build.ensure_source_bucket(&spec.project_id, &spec.region).await {
        Ok(bucket) => bucket,
        Err(err) => {
            record.record_stage(StageTag::RepoAccess, StageOutcome::Failed, started.elapsed().as_millis() as u64);
            let mapped = map_cloud_error(StageKind::Preflight, "repo-access", err);
            let _ = clients
                .progress
                .publish(deployment_id, StageTag::RepoAccess, StageState::Failed, mapped.to_string(), None)
                .await;
            return Err(mapped);
        }
    };

    record.record_stage(StageTag::RepoAccess, StageOutcome::Success, started.elapsed().as_millis() as u64);
    clients
        .progress
        .publish(
            deployment_id,
            StageTag::RepoAccess,
            StageState::Complete,
            "cloud access verified",
            Some(serde_json::json!({ "image_registry": registry, "source_bucket": bucket })),
        )
        .await?;
    Ok(())
}

async fn stage_container_build(
    clients: &PipelineClients,
    record: &mut DeploymentRecord,
    deployment_id: DeploymentId,
    working_copy: &Path,
    recipe_text: &str,
    spec: &DeploySpec<'_>,
) -> Result<String> {
    let started = Instant::now();
    clients
        .progress
        .publish(deployment_id, StageTag::ContainerBuild, StageState::Started, "building container image", None)
        .await?;

    for finding in scan_recipe(recipe_text) {
        clients
            .progress
            .publish(
                deployment_id,
                StageTag::ContainerBuild,
                StageState::InProgress,
                finding.message.clone(),
                Some(serde_json::to_value(&finding).unwrap_or_default()),
            )
            .await?;
    }

    match build_image(clients, working_copy, spec).await {
        Ok(tag) => {
            record.record_stage(StageTag::ContainerBuild, StageOutcome::Success, started.elapsed().as_millis() as u64);
            clients
                .progress
                .publish(
                    deployment_id,
                    StageTag::ContainerBuild,
                    StageState::Complete,
                    "image built",
                    Some(serde_json::json!({ "image_tag": tag })),
                )
                .await?;
            Ok(tag)
        }
        Err(err) => {
            record.record_stage(StageTag::ContainerBuild, StageOutcome::Failed, started.elapsed().as_millis() as u64);
            let mapped = map_cloud_error(StageKind::Build, "container-build", err);
            let _ = clients
                .progress
                .publish(deployment_id, StageTag::ContainerBuild, StageState::Failed, mapped.to_string(), None)
                .await;
            Err(mapped)
        }
    }
}

async fn build_image(clients: &PipelineClients, working_copy: &Path, spec: &DeploySpec<'_>) -> deploy_cloud::Result<String> {
    let archive = deploy_cloud::create_gzipped_tar(working_copy)?;
    let object_name = format!("{}-{}.tar.gz", spec.service_name, uuid::Uuid::new_v4());
    let tag = image_tag(&spec.region, &spec.project_id, &spec.registry, &spec.service_name);

    crate::retry::with_retry(BUILD_DEPLOY_RETRY_ATTEMPTS, BUILD_DEPLOY_RETRY_BASE, || {
        let build = clients.build.clone();
        let object_name = object_name.clone();
        let tag = tag.clone();
        let archive = archive.clone();
        let project_id = spec.project_id.clone();
        let region = spec.region.clone();
        async move {
            let bucket = build.ensure_source_bucket(&project_id, &region).await?;
            build.upload_blob(&bucket, &object_name, archive).await?;
            let operation_id = build.submit_build(&project_id, &bucket, &object_name, &tag).await?;
            deploy_cloud::poll_until_done(|| build.poll_operation(&operation_id), BUILD_STAGE_TIMEOUT).await
        }
    })
    .await?;

    Ok(tag)
}

async fn stage_cloud_deployment(
    clients: &PipelineClients,
    record: &mut DeploymentRecord,
    deployment_id: DeploymentId,
    analysis: &AnalysisResult,
    image_tag: &str,
    spec: &DeploySpec<'_>,
) -> Result<(String, ResourceConfig)> {
    let started = Instant::now();
    clients
        .progress
        .publish(deployment_id, StageTag::CloudDeployment, StageState::Started, "deploying service", None)
        .await?;

    let mut labels = HashMap::new();
    labels.insert("managed-by".to_string(), "deploy-pipeline".to_string());
    labels.insert("user-id".to_string(), spec.user_id.clone());

    let env_vars = spec
        .env_vars
        .iter()
        .map(|v| (v.key.clone(), v.value.clone()))
        .collect::<HashMap<_, _>>();

    let resources = ResourceConfig::default_for_framework(analysis.framework.as_deref());
    let service_spec = ServiceSpec {
        name: spec.service_name.clone(),
        image_tag: image_tag.to_string(),
        port: SERVICE_PORT,
        resources: resources.clone(),
        labels,
        env_vars,
    };

    match deploy_service(clients, &spec.project_id, &spec.region, &service_spec).await {
        Ok(url) => {
            record.record_stage(StageTag::CloudDeployment, StageOutcome::Success, started.elapsed().as_millis() as u64);
            clients
                .progress
                .publish(
                    deployment_id,
                    StageTag::CloudDeployment,
                    StageState::Complete,
                    "service deployed",
                    Some(serde_json::json!({ "url": url })),
                )
                .await?;
            Ok((url, resources))
        }
        Err(err) => {
            record.record_stage(StageTag::CloudDeployment, StageOutcome::Failed, started.elapsed().as_millis() as u64);
            let mapped = map_cloud_error(StageKind::Deploy, "cloud-deployment", err);
            let _ = clients
                .progress
                .publish(deployment_id, StageTag::CloudDeployment, StageState::Failed, mapped.to_string(), None)
                .await;
            Err(mapped)
        }
    }
}

async fn deploy_service(
    clients: &PipelineClients,
    project_id: &str,
    region: &str,
    service_spec: &ServiceSpec,
) -> deploy_cloud::Result<String> {
    crate::retry::with_retry(BUILD_DEPLOY_RETRY_ATTEMPTS, BUILD_DEPLOY_RETRY_BASE, || {
        let serverless = clients.serverless.clone();
        let project_id = project_id.to_string();
        let region = region.to_string();
        async move {
            let operation_id = serverless.ensure_service(&project_id, &region, service_spec).await?;
            deploy_cloud::poll_until_done(|| serverless.poll_operation(&operation_id), DEPLOY_STAGE_TIMEOUT).await?;
            serverless
                .get_service(&project_id, &region, &service_spec.name)
                .await?
                .ok_or_else(|| deploy_cloud::CloudError::NotFound(format!("service {} not found after deploy", service_spec.name)))
        }
    })
    .await
}

/// Health-verification failure is a non-terminal warning (spec.md §7, S6):
/// every other error kind unwinds the pipeline, this one never does. The
/// stage metric is still truthfully recorded `failed`.
async fn stage_health_verification(
    clients: &PipelineClients,
    record: &mut DeploymentRecord,
    deployment_id: DeploymentId,
    service_url: &str,
) -> Result<HealthOutcome> {
    let started = Instant::now();
    clients
        .progress
        .publish(deployment_id, StageTag::HealthVerification, StageState::Started, "verifying health", None)
        .await?;

    let result = tokio::time::timeout(HEALTH_STAGE_TIMEOUT, deploy_health::verify_health(service_url, &clients.http_client)).await;

    match result {
        Ok(Ok(timing)) => {
            record.record_stage(StageTag::HealthVerification, StageOutcome::Success, started.elapsed().as_millis() as u64);
            clients
                .progress
                .publish(
                    deployment_id,
                    StageTag::HealthVerification,
                    StageState::Complete,
                    "service is healthy",
                    Some(serde_json::json!({ "attempts": timing.attempts, "path": timing.path, "elapsed_ms": timing.total.as_millis() })),
                )
                .await?;
            Ok(HealthOutcome { timing: Some(timing), warning: None })
        }
        Ok(Err(err)) => {
            record.record_stage(StageTag::HealthVerification, StageOutcome::Failed, started.elapsed().as_millis() as u64);
            let _ = clients
                .progress
                .publish(deployment_id, StageTag::HealthVerification, StageState::Failed, err.to_string(), None)
                .await;
            Ok(HealthOutcome { timing: None, warning: Some(err.to_string()) })
        }
        Err(_elapsed) => {
            let message = DeployError::HealthDegraded("health verification timed out".to_string()).to_string();
            record.record_stage(StageTag::HealthVerification, StageOutcome::Failed, started.elapsed().as_millis() as u64);
            let _ = clients
                .progress
                .publish(deployment_id, StageTag::HealthVerification, StageState::Failed, message.clone(), None)
                .await;
            Ok(HealthOutcome { timing: None, warning: Some(message) })
        }
    }
}

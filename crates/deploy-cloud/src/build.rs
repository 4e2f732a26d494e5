//! The managed build collaborator (spec.md §6): {ensure source bucket;
//! upload blob; submit build referencing bucket object; poll operation;
//! fetch logs}.

use crate::error::{CloudError, Result};
use crate::operation::OperationStatus;
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};

/// `<region>-docker.pkg.dev/<project>/<registry>/<image>:latest` (spec.md §6).
pub fn image_tag(region: &str, project: &str, registry: &str, image: &str) -> String {
    format!("{region}-docker.pkg.dev/{project}/{registry}/{image}:latest")
}

#[async_trait]
pub trait BuildClient: Send + Sync {
    /// Preflight: project reachable and required cloud APIs enabled
    /// (spec.md §4.4 stage 4).
    async fn verify_project_access(&self, project_id: &str, region: &str) -> Result<()>;
    async fn ensure_image_registry(&self, project_id: &str, region: &str, registry: &str) -> Result<String>;
    async fn ensure_source_bucket(&self, project_id: &str, region: &str) -> Result<String>;
    async fn upload_blob(&self, bucket: &str, object_name: &str, data: Vec<u8>) -> Result<()>;
    async fn submit_build(&self, project_id: &str, bucket: &str, object_name: &str, image_tag: &str) -> Result<String>;
    async fn poll_operation(&self, operation_id: &str) -> Result<OperationStatus>;
    async fn fetch_logs(&self, operation_id: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct SubmitBuildRequest<'a> {
    project_id: &'a str,
    source_bucket: &'a str,
    source_object: &'a str,
    image_tag: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitBuildResponse {
    operation_id: String,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    done: bool,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpBuildClient {
    client: ClientWithMiddleware,
    api_base: String,
}

impl HttpBuildClient {
    pub fn new(client: ClientWithMiddleware, api_base: impl Into<String>) -> Self {
        Self { client, api_base: api_base.into() }
    }
}

#[async_trait]
impl BuildClient for HttpBuildClient {
    async fn verify_project_access(&self, project_id: &str, region: &str) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/projects/{project_id}/regions/{region}", self.api_base))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CloudError::OperationFailed(format!(
                "verify_project_access failed: {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn ensure_image_registry(&self, project_id: &str, region: &str, registry: &str) -> Result<String> {
        let response = self
            .client
            .put(format!("{}/registries/{registry}", self.api_base))
            .json(&serde_json::json!({ "project_id": project_id, "region": region }))
            .send()
            .await?;
        if !response.status().is_success() && response.status().as_u16() != 409 {
            return Err(CloudError::OperationFailed(format!(
                "ensure_image_registry failed: {}",
                response.status()
            )));
        }
        Ok(registry.to_string())
    }

    async fn ensure_source_bucket(&self, project_id: &str, region: &str) -> Result<String> {
        let bucket = format!("{project_id}-{region}-deploy-sources");
        let response = self
            .client
            .put(format!("{}/buckets/{bucket}", self.api_base))
            .json(&serde_json::json!({ "project_id": project_id, "region": region }))
            .send()
            .await?;
        if !response.status().is_success() && response.status().as_u16() != 409 {
            return Err(CloudError::OperationFailed(format!(
                "ensure_source_bucket failed: {}",
                response.status()
            )));
        }
        Ok(bucket)
    }

    async fn upload_blob(&self, bucket: &str, object_name: &str, data: Vec<u8>) -> Result<()> {
        let response = self
            .client
            .put(format!("{}/buckets/{bucket}/objects/{object_name}", self.api_base))
            .body(data)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CloudError::OperationFailed(format!("upload_blob failed: {}", response.status())));
        }
        Ok(())
    }

    async fn submit_build(&self, project_id: &str, bucket: &str, object_name: &str, image_tag: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/builds", self.api_base))
            .json(&SubmitBuildRequest {
                project_id,
                source_bucket: bucket,
                source_object: object_name,
                image_tag,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CloudError::OperationFailed(format!("submit_build failed: {}", response.status())));
        }
        let parsed: SubmitBuildResponse = response.json().await?;
        Ok(parsed.operation_id)
    }

    async fn poll_operation(&self, operation_id: &str) -> Result<OperationStatus> {
        let response = self
            .client
            .get(format!("{}/operations/{operation_id}", self.api_base))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CloudError::OperationFailed(format!("poll_operation failed: {}", response.status())));
        }
        let parsed: OperationResponse = response.json().await?;
        Ok(if !parsed.done {
            OperationStatus::Running
        } else if parsed.success {
            OperationStatus::Done { success: true, error: None }
        } else {
            OperationStatus::Done { success: false, error: parsed.error }
        })
    }

    async fn fetch_logs(&self, operation_id: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/operations/{operation_id}/logs", self.api_base))
            .send()
            .await?;
        Ok(response.text().await.unwrap_or_default())
    }
}

//! The managed serverless collaborator (spec.md §6): {ensure service; get
//! service; create service; update service; fetch service logs}.

use crate::error::{CloudError, Result};
use crate::operation::OperationStatus;
use async_trait::async_trait;
use deploy_core::ResourceConfig;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct ServiceSpec {
    pub name: String,
    pub image_tag: String,
    pub port: u16,
    pub resources: ResourceConfig,
    pub labels: HashMap<String, String>,
    pub env_vars: HashMap<String, String>,
}

#[async_trait]
pub trait ServerlessClient: Send + Sync {
    async fn get_service(&self, project_id: &str, region: &str, name: &str) -> Result<Option<String>>;
    async fn create_service(&self, project_id: &str, region: &str, spec: &ServiceSpec) -> Result<String>;
    async fn update_service(&self, project_id: &str, region: &str, spec: &ServiceSpec) -> Result<String>;
    async fn fetch_logs(&self, project_id: &str, region: &str, name: &str) -> Result<String>;
    async fn poll_operation(&self, operation_id: &str) -> Result<OperationStatus>;

    /// Idempotent service creation (spec.md §4.4): GET first; on not-found
    /// create, otherwise update. Returns the operation id.
    async fn ensure_service(&self, project_id: &str, region: &str, spec: &ServiceSpec) -> Result<String> {
        match self.get_service(project_id, region, &spec.name).await? {
            Some(_) => self.update_service(project_id, region, spec).await,
            None => self.create_service(project_id, region, spec).await,
        }
    }
}

pub struct HttpServerlessClient {
    client: ClientWithMiddleware,
    api_base: String,
}

impl HttpServerlessClient {
    pub fn new(client: ClientWithMiddleware, api_base: impl Into<String>) -> Self {
        Self { client, api_base: api_base.into() }
    }

    fn service_url(&self, project_id: &str, region: &str, name: &str) -> String {
        format!("{}/projects/{project_id}/regions/{region}/services/{name}", self.api_base)
    }
}

#[derive(Debug, serde::Deserialize)]
struct OperationIdResponse {
    operation_id: String,
}

#[derive(Debug, serde::Deserialize)]
struct OperationResponse {
    done: bool,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl ServerlessClient for HttpServerlessClient {
    async fn get_service(&self, project_id: &str, region: &str, name: &str) -> Result<Option<String>> {
        let response = self.client.get(self.service_url(project_id, region, name)).send().await?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(CloudError::OperationFailed(format!("get_service failed: {}", response.status())));
        }
        let body: serde_json::Value = response.json().await?;
        Ok(body.get("url").and_then(|v| v.as_str()).map(str::to_string))
    }

    async fn create_service(&self, project_id: &str, region: &str, spec: &ServiceSpec) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/projects/{project_id}/regions/{region}/services", self.api_base))
            .json(spec)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CloudError::OperationFailed(format!("create_service failed: {}", response.status())));
        }
        let parsed: OperationIdResponse = response.json().await?;
        Ok(parsed.operation_id)
    }

    async fn update_service(&self, project_id: &str, region: &str, spec: &ServiceSpec) -> Result<String> {
        let response = self
            .client
            .put(self.service_url(project_id, region, &spec.name))
            .json(spec)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CloudError::OperationFailed(format!("update_service failed: {}", response.status())));
        }
        let parsed: OperationIdResponse = response.json().await?;
        Ok(parsed.operation_id)
    }

    async fn fetch_logs(&self, project_id: &str, region: &str, name: &str) -> Result<String> {
        let url = format!("{}/logs", self.service_url(project_id, region, name));
        let response = self.client.get(url).send().await?;
        Ok(response.text().await.unwrap_or_default())
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct RecordingClient {
        get_calls: AtomicUsize,
        create_calls: AtomicUsize,
        update_calls: AtomicUsize,
        existing: bool,
    }

    #[async_trait]
    impl ServerlessClient for RecordingClient {
        async fn get_service(&self, _p: &str, _r: &str, _n: &str) -> Result<Option<String>> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            Ok(if self.existing { Some("https://svc.example".to_string()) } else { None })
        }
        async fn create_service(&self, _p: &str, _r: &str, _s: &ServiceSpec) -> Result<String> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            Ok("op-create".to_string())
        }
        async fn update_service(&self, _p: &str, _r: &str, _s: &ServiceSpec) -> Result<String> {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            Ok("op-update".to_string())
        }
        async fn fetch_logs(&self, _p: &str, _r: &str, _n: &str) -> Result<String> {
            Ok(String::new())
        }
        async fn poll_operation(&self, _operation_id: &str) -> Result<OperationStatus> {
            Ok(OperationStatus::Done { success: true, error: None })
        }
    }

    fn spec() -> ServiceSpec {
        ServiceSpec {
            name: "flask-app".to_string(),
            image_tag: "us-central1-docker.pkg.dev/p/r/flask-app:latest".to_string(),
            port: 8080,
            resources: ResourceConfig::default_for_framework(None),
            labels: HashMap::new(),
            env_vars: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn ensure_service_creates_when_absent() {
        let client = Arc::new(RecordingClient {
            get_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            existing: false,
        });
        let op = client.ensure_service("p", "r", &spec()).await.unwrap();
        assert_eq!(op, "op-create");
        assert_eq!(client.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.update_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ensure_service_updates_when_present() {
        let client = Arc::new(RecordingClient {
            get_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            existing: true,
        });
        let op = client.ensure_service("p", "r", &spec()).await.unwrap();
        assert_eq!(op, "op-update");
        assert_eq!(client.update_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.create_calls.load(Ordering::SeqCst), 0);
    }
}

mod clone;
mod deploy;
mod errors;
mod retry;
mod security;

use deploy_cloud::{BuildClient, GitClient, ServerlessClient};
use deploy_llm::ModelBroker;
use deploy_progress::ProgressBus;
use std::sync::Arc;

pub use clone::clone_and_analyze;
pub use deploy::{deploy, DeploySpec, DeployOutcome};
pub use security::{scan_recipe, SecurityFinding, SecuritySeverity};

/// Collaborators the Pipeline Engine threads through every stage (spec.md
/// §4.4). Cloned cheaply: every field is an `Arc` or a handle.
#[derive(Clone)]
pub struct PipelineClients {
    pub git: Arc<dyn GitClient>,
    pub build: Arc<dyn BuildClient>,
    pub serverless: Arc<dyn ServerlessClient>,
    pub broker: Arc<ModelBroker>,
    pub http_client: reqwest::Client,
    pub progress: ProgressBus,
}
